//! Lifecycle notifications mirroring the client's diagnostic log lines.

use std::fmt;
use std::time::Duration;

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectReason {
    pub message: String,
    /// WebSocket close code, when the peer sent one.
    pub code: Option<u16>,
}

impl DisconnectReason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Published on the client's lifecycle broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Connected { connection_id: String },
    Disconnected { reason: DisconnectReason },
    /// Transport-level failure; a closure normally follows.
    TransportError { message: String },
    /// An inbound frame could not be decoded and was dropped.
    DecodeFailed { message: String },
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// The attempt budget is used up; the client stays idle.
    ReconnectsExhausted { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_reason_display() {
        assert_eq!(DisconnectReason::new("stream ended").to_string(), "stream ended");
        assert_eq!(
            DisconnectReason::with_code("going away", 1001).to_string(),
            "going away (code 1001)"
        );
    }
}
