//! Transport seam: how the client opens and reads its live connection.

pub mod ws;

use async_trait::async_trait;

use crate::error::LiveResult;
use crate::models::DisconnectReason;

pub use ws::{WsConnection, WsConnector};

/// One signal read from an open connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A text payload to decode.
    Text(String),
    /// Transport-level failure. The next read yields `Closed`.
    Error(String),
    Closed(DisconnectReason),
}

/// Opens connections to the live-update endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, endpoint: &str) -> LiveResult<Box<dyn Connection>>;
}

/// An open connection.
#[async_trait]
pub trait Connection: Send {
    /// Next inbound signal. Must be cancel-safe: the worker polls it inside `select!`.
    async fn next(&mut self) -> Inbound;

    /// Close from our side. Errors are swallowed.
    async fn close(&mut self);
}
