//! Radar Server Library - REST API for record lookups, search history and webhooks
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod maintenance;
pub mod routes;
pub mod state;

pub use auth::{ActingUser, USER_HEADER};
pub use config::Config;
pub use db::PgStore;
pub use error::ApiError;
pub use maintenance::{spawn_expiry_sweeper, sweep_once};
pub use routes::{create_router, create_router_with_config};
pub use state::AppState;
