//! Live build-status client for the zupfmanager backend.
//!
//! Keeps one WebSocket connection to the server's build event stream, routes
//! each status update to the subscriber registered for its build id, and
//! reconnects with bounded exponential backoff while anyone is still listening.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod transport;

pub use config::Config;
pub use error::{LiveError, LiveResult};
pub use models::{BuildStatus, BuildStatusUpdate, ClientSnapshot, ConnectionState, LifecycleEvent};
pub use services::{LiveClient, ReconnectPolicy};

/// Build a client from configuration. Used by main and by integration tests.
pub fn create_client(config: &Config) -> LiveClient {
    LiveClient::from_config(config)
}
