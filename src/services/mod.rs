//! Client logic: subscriber registry, reconnect policy, and the worker that ties them together.

pub mod backoff;
pub mod client;
pub mod registry;

pub use backoff::{ReconnectDecision, ReconnectPolicy};
pub use client::LiveClient;
pub use registry::{Route, StatusCallback, SubscriberRegistry};
