//! Remote conversational session
//!
//! The transport is a black box exposing start/end and pushing lifecycle
//! events. [`SessionController`] wraps it with the connect-in-flight guard
//! and guarantees a stable terminal status after every failure.

mod controller;
mod simulated;
mod transport;

use serde::{Deserialize, Serialize};

pub use controller::{SessionController, ToggleOutcome};
pub use simulated::SimulatedTransport;
pub use transport::{SessionTransport, TransportError, TransportEvent, TransportSink};

#[cfg(test)]
pub use transport::SessionConfig;

/// Lifecycle of one connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnecting,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "Idle"),
            SessionStatus::Connecting => write!(f, "Connecting"),
            SessionStatus::Connected => write!(f, "Connected"),
            SessionStatus::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}
