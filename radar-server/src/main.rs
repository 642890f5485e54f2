//! Radar Server - REST API for traffic-infraction record lookups
//!
//! Exposes radar-core over HTTP:
//! - POST /api/v1/consultations - Submit a lookup
//! - GET  /api/v1/consultations/{id} - Poll its status
//! - POST /api/v1/consultations/{id}/finalize - Collect the normalized result
//! - GET  /api/v1/history - Search history of the acting user
//! - /api/v1/webhooks, /api/v1/events - Webhook administration and event fan-out

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use radar_core::{
    ConsultationStore, HistoryStore, Ledger, MemoryStore, Orchestrator, ProviderRegistry,
    WebhookDispatcher, WebhookStore,
};
use radar_server::{create_router_with_config, spawn_expiry_sweeper, AppState, Config, PgStore};
use tracing_subscriber::EnvFilter;

struct Stores {
    consultations: Arc<dyn ConsultationStore>,
    history: Arc<dyn HistoryStore>,
    webhooks: Arc<dyn WebhookStore>,
    database: Option<PgStore>,
}

async fn open_stores(config: &Config) -> anyhow::Result<Stores> {
    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(
                url,
                config.database_max_connections,
                config.database_min_connections,
            )
            .await
            .context("Failed to connect to PostgreSQL")?;
            let shared = Arc::new(store.clone());
            Ok(Stores {
                consultations: shared.clone(),
                history: shared.clone(),
                webhooks: shared,
                database: Some(store),
            })
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage (data is lost on restart)");
            let shared = Arc::new(MemoryStore::new());
            Ok(Stores {
                consultations: shared.clone(),
                history: shared.clone(),
                webhooks: shared,
                database: None,
            })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let providers =
        ProviderRegistry::from_config(&config.lookup).context("Failed to build lookup providers")?;
    if providers.is_empty() {
        tracing::warn!("No lookup provider configured, every lookup will fail with NO_PROVIDER");
    }

    let stores = open_stores(&config).await?;
    let orchestrator = Arc::new(Orchestrator::new(
        stores.consultations,
        Ledger::new(stores.history),
        providers,
        config.lookup.demo_mode,
    ));
    let dispatcher = WebhookDispatcher::new(stores.webhooks, config.dispatch.clone())
        .context("Failed to build webhook dispatcher")?;

    let mut state = AppState::new(orchestrator.clone(), dispatcher);
    if let Some(database) = stores.database {
        state = state.with_database(database);
    }

    let sweeper = spawn_expiry_sweeper(orchestrator, config.stale_after, config.sweep_interval);

    let app = create_router_with_config(state, &config);
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(
        %addr,
        demo_mode = config.lookup.demo_mode,
        "Radar server listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    sweeper.abort();
    tracing::info!("Server shut down");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Received shutdown signal");
}
