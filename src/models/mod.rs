//! Data models for status events, connection state and lifecycle notifications.

pub mod connection;
pub mod event;
pub mod lifecycle;

pub use connection::*;
pub use event::*;
pub use lifecycle::*;
