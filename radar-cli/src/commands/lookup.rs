//! Lookup command implementation.
//!
//! Runs one lookup to completion through the Polling Coordinator, either
//! against an in-process orchestrator or a remote radar-server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use radar_core::{
    AuthContext, CanonicalRequest, ConsultationApi, Ledger, LookupConfig, MemoryStore,
    Orchestrator, OrchestratorSession, PollOutcome, PollingConfig, PollingCoordinator,
    ProviderRegistry, SearchType,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::output;
use crate::remote::RemoteApi;

pub struct LookupArgs {
    pub search_type: SearchType,
    pub query: String,
    pub birth_date: Option<String>,
    pub renavam: Option<String>,
    pub server: Option<String>,
    pub user: Option<Uuid>,
    pub demo: bool,
    pub poll_interval: Option<Duration>,
    pub max_wait: Option<Duration>,
}

fn build_request(args: &LookupArgs) -> radar_core::Result<CanonicalRequest> {
    let request = CanonicalRequest::from_query(args.search_type, args.query.clone(), args.birth_date.clone())?;
    Ok(match request {
        CanonicalRequest::VehicleFines { plate, .. } => CanonicalRequest::VehicleFines {
            plate,
            renavam: args.renavam.clone(),
        },
        other => other,
    })
}

fn local_api(config: &LookupConfig, user: Uuid) -> Result<Arc<dyn ConsultationApi>> {
    let providers =
        ProviderRegistry::from_config(config).context("Failed to build lookup providers")?;
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        Ledger::new(store),
        providers,
        config.demo_mode,
    ));
    Ok(Arc::new(OrchestratorSession::new(
        orchestrator,
        AuthContext::user(user),
    )))
}

/// Execute the lookup command.
pub async fn execute(args: LookupArgs, json: bool, quiet: bool) -> Result<()> {
    let request = build_request(&args).context("Invalid lookup")?;

    let mut config = LookupConfig::from_env();
    if args.demo {
        config.demo_mode = true;
    }
    let polling = PollingConfig {
        interval: args.poll_interval.unwrap_or(config.polling.interval),
        max_duration: args.max_wait.unwrap_or(config.polling.max_duration),
    };

    let api: Arc<dyn ConsultationApi> = match &args.server {
        Some(server) => {
            let user = args
                .user
                .context("--user (or RADAR_USER_ID) is required with --server")?;
            info!(%server, %user, "Using remote server");
            Arc::new(RemoteApi::new(server, user, config.request_timeout)?)
        }
        None => local_api(&config, args.user.unwrap_or_else(Uuid::new_v4))?,
    };

    if !quiet && !json {
        eprintln!(
            "{} {} {}",
            "Looking up".cyan(),
            args.search_type.as_str(),
            args.query.bold()
        );
    }

    let coordinator = PollingCoordinator::new(api, polling);
    let (receipt, outcome) = coordinator.lookup(request).await.context("Lookup failed")?;
    info!(request_id = %receipt.request_id, status = %receipt.status.as_str(), "Submitted");

    if let PollOutcome::TimedOut { request_id, polls, .. } = &outcome {
        warn!(%request_id, polls, "Still processing when the wait limit was reached");
        if !quiet && !json {
            eprintln!(
                "{} request {} is still processing; check again later",
                "PENDING".yellow().bold(),
                request_id
            );
        }
    }

    let result = outcome
        .into_result()
        .with_context(|| format!("Lookup {} did not complete", receipt.request_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !quiet {
        output::print_result(&result);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(search_type: SearchType, query: &str) -> LookupArgs {
        LookupArgs {
            search_type,
            query: query.into(),
            birth_date: None,
            renavam: None,
            server: None,
            user: None,
            demo: false,
            poll_interval: None,
            max_wait: None,
        }
    }

    #[test]
    fn test_build_request_carries_optional_fields() {
        let mut fines = args(SearchType::VehicleFines, "ABC1234");
        fines.renavam = Some("12345678901".into());
        assert_eq!(
            build_request(&fines).unwrap(),
            CanonicalRequest::VehicleFines {
                plate: "ABC1234".into(),
                renavam: Some("12345678901".into()),
            }
        );

        assert!(build_request(&args(SearchType::Cnh, "02650306461")).is_err());
    }
}
