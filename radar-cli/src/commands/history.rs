//! History command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::output;
use crate::remote::{HistoryParams, RemoteApi};

/// Execute the history command against a remote server.
pub async fn execute(server: &str, user: Uuid, params: HistoryParams, json: bool) -> Result<()> {
    let api = RemoteApi::new(server, user, Duration::from_secs(30))?;
    let page = api
        .history(&params)
        .await
        .context("Failed to fetch search history")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        output::print_history(&page);
    }
    Ok(())
}
