//! Session controller
//!
//! The single entry point for connect/disconnect, whether a user tapped or
//! a wake word fired. Transport calls run as spawned tasks and report back
//! as arbiter inputs, so a second toggle arriving mid-connect sees the
//! in-flight guard instead of queueing behind the first.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::AssistantError;
use crate::permission::PermissionState;
use crate::state::{ArbiterState, Input};
use crate::wake::WakeWordListener;

use super::transport::{SessionConfig, SessionTransport, TransportError, TransportEvent};
use super::SessionStatus;

/// What a toggle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A connect is already in flight, or the session is winding down
    Ignored,
    Connecting,
    Disconnecting,
    /// Permission must be requested before connecting
    PermissionRequired,
    MissingAgent,
}

pub struct SessionController {
    transport: Arc<dyn SessionTransport>,
    agent_id: String,
    inputs: mpsc::UnboundedSender<Input>,
}

impl SessionController {
    pub fn new(
        transport: Arc<dyn SessionTransport>,
        agent_id: String,
        inputs: mpsc::UnboundedSender<Input>,
    ) -> Self {
        Self {
            transport,
            agent_id,
            inputs,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Connect when idle, disconnect when connected
    pub fn toggle(&self, state: &mut ArbiterState, listener: &mut WakeWordListener) -> ToggleOutcome {
        if state.connect_in_flight || state.status == SessionStatus::Connecting {
            debug!("connect already in flight, ignoring toggle");
            return ToggleOutcome::Ignored;
        }

        match state.status {
            SessionStatus::Connected => {
                listener.stop(state);
                self.begin_end(state);
                ToggleOutcome::Disconnecting
            }
            SessionStatus::Disconnecting | SessionStatus::Connecting => {
                debug!(status = %state.status, "session busy, ignoring toggle");
                ToggleOutcome::Ignored
            }
            SessionStatus::Idle => {
                if state.permission != PermissionState::Granted {
                    return ToggleOutcome::PermissionRequired;
                }
                if self.agent_id.is_empty() {
                    state.raise(&AssistantError::MissingAgent);
                    return ToggleOutcome::MissingAgent;
                }

                listener.stop(state);
                self.begin_start(state);
                ToggleOutcome::Connecting
            }
        }
    }

    /// End a live session; no-op in any other status
    pub fn end_session(&self, state: &mut ArbiterState, listener: &mut WakeWordListener) {
        if state.status != SessionStatus::Connected {
            debug!(status = %state.status, "no live session to end");
            return;
        }
        listener.stop(state);
        self.begin_end(state);
    }

    /// `start_session` resolved
    pub fn on_start_finished(&self, state: &mut ArbiterState, result: Result<(), TransportError>) {
        state.connect_in_flight = false;

        match result {
            Ok(()) => {
                if state.status == SessionStatus::Connecting {
                    transition(state, SessionStatus::Connected);
                }
            }
            Err(e) => {
                error!(error = %e, "connection failed");
                state.raise(&AssistantError::classify_start_failure(&e.to_string()));
                state.speaking = false;
                transition(state, SessionStatus::Idle);
            }
        }
    }

    /// `end_session` resolved
    pub fn on_end_finished(&self, state: &mut ArbiterState, result: Result<(), TransportError>) {
        if let Err(e) = result {
            error!(error = %e, "failed to end session");
            state.raise(&AssistantError::SessionRuntime(e.to_string()));
        }
        if state.status == SessionStatus::Disconnecting {
            state.speaking = false;
            transition(state, SessionStatus::Idle);
        }
    }

    pub fn on_transport_event(
        &self,
        state: &mut ArbiterState,
        listener: &mut WakeWordListener,
        event: TransportEvent,
    ) {
        match event {
            TransportEvent::Connected => {
                if state.status != SessionStatus::Connecting {
                    warn!(status = %state.status, "unexpected connected event");
                    return;
                }
                listener.stop(state);
                transition(state, SessionStatus::Connected);
            }
            TransportEvent::Disconnected => {
                listener.stop(state);
                state.speaking = false;
                if state.status != SessionStatus::Idle {
                    transition(state, SessionStatus::Idle);
                }
            }
            TransportEvent::Speaking(speaking) => {
                if state.status == SessionStatus::Connected {
                    state.speaking = speaking;
                }
            }
            TransportEvent::Message(message) => {
                debug!(%message, "agent message");
            }
            TransportEvent::Error(message) => {
                error!(%message, "session error");
                state.raise(&AssistantError::SessionRuntime(message));
                if state.status == SessionStatus::Connected {
                    self.begin_end(state);
                }
            }
        }
    }

    /// Close whatever session exists, waiting for the transport
    pub async fn shutdown(&self, state: &mut ArbiterState) {
        if state.status == SessionStatus::Idle && !state.connect_in_flight {
            return;
        }

        if let Err(e) = self.transport.end_session().await {
            warn!(error = %e, "failed to end session during shutdown");
        }
        state.connect_in_flight = false;
        state.speaking = false;
        transition(state, SessionStatus::Idle);
    }

    fn begin_start(&self, state: &mut ArbiterState) {
        state.connect_in_flight = true;
        transition(state, SessionStatus::Connecting);

        let transport = Arc::clone(&self.transport);
        let inputs = self.inputs.clone();
        let config = SessionConfig {
            agent_id: self.agent_id.clone(),
        };
        tokio::spawn(async move {
            let result = transport.start_session(config).await;
            let _ = inputs.send(Input::SessionStarted(result));
        });
    }

    fn begin_end(&self, state: &mut ArbiterState) {
        transition(state, SessionStatus::Disconnecting);

        let transport = Arc::clone(&self.transport);
        let inputs = self.inputs.clone();
        tokio::spawn(async move {
            let result = transport.end_session().await;
            let _ = inputs.send(Input::SessionEnded(result));
        });
    }
}

fn transition(state: &mut ArbiterState, to: SessionStatus) {
    if state.status != to {
        info!(from = %state.status, to = %to, "session transition");
        state.status = to;
    }
}
