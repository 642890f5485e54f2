//! Shared helpers: stub provider servers and an in-memory orchestrator.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use radar_core::{
    BackoffExecutor, ExecutorConfig, Ledger, MemoryStore, Orchestrator, ProviderRegistry,
};

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });
    format!("http://{addr}")
}

/// Executor allowed to reach plain-http stubs, with short delays.
pub fn test_executor_config() -> ExecutorConfig {
    ExecutorConfig {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(200),
        https_only: false,
        ..Default::default()
    }
}

pub fn test_executor() -> BackoffExecutor {
    BackoffExecutor::new(test_executor_config()).expect("executor")
}

pub fn orchestrator(registry: ProviderRegistry, demo_mode: bool) -> (Arc<Orchestrator>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(
        store.clone(),
        Ledger::new(store.clone()),
        registry,
        demo_mode,
    );
    (Arc::new(orchestrator), store)
}
