//! Local stand-in for the remote agent transport
//!
//! Lets the daemon run end-to-end without network access: sessions connect
//! after a fixed latency and only agent identifiers of the `agent_` form are
//! accepted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::transport::{SessionConfig, SessionTransport, TransportError, TransportEvent, TransportSink};

pub struct SimulatedTransport {
    latency: Duration,
    sink: TransportSink,
    live: AtomicBool,
}

impl SimulatedTransport {
    pub fn new(latency: Duration, sink: TransportSink) -> Self {
        Self {
            latency,
            sink,
            live: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SessionTransport for SimulatedTransport {
    async fn start_session(&self, config: SessionConfig) -> Result<(), TransportError> {
        if !config.agent_id.starts_with("agent_") {
            return Err(TransportError::Rejected(format!(
                "Unknown agent '{}'",
                config.agent_id
            )));
        }

        debug!(agent_id = %config.agent_id, latency_ms = self.latency.as_millis() as u64, "simulated connect");
        tokio::time::sleep(self.latency).await;

        if self.live.swap(true, Ordering::SeqCst) {
            return Err(TransportError::Rejected("a session is already live".to_string()));
        }

        info!(agent_id = %config.agent_id, "simulated session connected");
        self.sink.emit(TransportEvent::Connected);
        Ok(())
    }

    async fn end_session(&self) -> Result<(), TransportError> {
        if self.live.swap(false, Ordering::SeqCst) {
            info!("simulated session ended");
            self.sink.emit(TransportEvent::Disconnected);
        }
        Ok(())
    }
}
