//! Conversational session transport seam

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::state::Input;

/// Parameters for opening a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub agent_id: String,
}

/// Lifecycle and media events pushed by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// The agent started or stopped talking
    Speaking(bool),
    Message(String),
    /// Mid-call failure
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The remote side refused the request
    #[error("{0}")]
    Rejected(String),

    #[error("transport is closed")]
    Closed,
}

/// Where a transport delivers its events
#[derive(Debug, Clone)]
pub struct TransportSink {
    tx: mpsc::UnboundedSender<Input>,
}

impl TransportSink {
    pub fn new(tx: mpsc::UnboundedSender<Input>) -> Self {
        Self { tx }
    }

    /// Deliver an event; returns false once the arbiter is gone
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send(Input::Transport(event)).is_ok()
    }
}

/// A real-time conversational session with a remote agent.
///
/// Neither call is bounded by a timeout here; failures are whatever the
/// transport itself rejects with.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Open a session; resolves once the session is connected
    async fn start_session(&self, config: SessionConfig) -> Result<(), TransportError>;

    /// Close the current session
    async fn end_session(&self) -> Result<(), TransportError>;
}
