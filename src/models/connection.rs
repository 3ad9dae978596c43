//! Connection state as seen from outside the worker.

use serde::Serialize;
use uuid::Uuid;

/// State of the single live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Closed,
    Connecting,
    Open,
}

/// Point-in-time view of a client, answered by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSnapshot {
    pub state: ConnectionState,
    /// Number of registered build ids.
    pub subscribers: usize,
    /// Reconnect attempts since the last successful open.
    pub reconnect_attempts: u32,
    /// Connections successfully opened over the client's lifetime.
    pub connections_opened: u64,
}

/// Generate a unique connection id for logs and lifecycle events.
pub fn generate_connection_id() -> String {
    format!("{}.{}", std::process::id(), Uuid::new_v4().as_simple())
}
