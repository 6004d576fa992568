//! The arbiter's flags and the reconciliation rule over them

use serde::Serialize;
use tokio::time::Instant;
use tracing::warn;

use crate::error::AssistantError;
use crate::permission::PermissionState;
use crate::platform::Capabilities;
use crate::session::SessionStatus;

/// Everything the handlers read and write, in one value.
///
/// Handlers for the listener and the session controller take this by
/// `&mut`, so tests can build any situation directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbiterState {
    pub permission: PermissionState,
    pub status: SessionStatus,
    /// The agent is talking (only meaningful while Connected)
    pub speaking: bool,
    /// A `start_session` call has not resolved yet
    pub connect_in_flight: bool,
    /// A wake word was matched and its connect request is pending
    pub wake_word_pending: bool,
    pub permission_request_in_flight: bool,
    /// A recognizer is started and has not been stopped or ended
    pub listener_active: bool,
    pub last_listener_start: Option<Instant>,
    /// User-controlled ambient listening switch
    pub ambient_enabled: bool,
    /// Dismissible banner text
    pub error: Option<String>,
}

impl Default for ArbiterState {
    fn default() -> Self {
        Self {
            permission: PermissionState::Unknown,
            status: SessionStatus::Idle,
            speaking: false,
            connect_in_flight: false,
            wake_word_pending: false,
            permission_request_in_flight: false,
            listener_active: false,
            last_listener_start: None,
            ambient_enabled: true,
            error: None,
        }
    }
}

impl ArbiterState {
    /// Record an error: show its message and drop permission if it revokes it
    pub fn raise(&mut self, error: &AssistantError) {
        if error.revokes_permission() {
            self.permission = PermissionState::Denied;
        }
        if let Some(message) = error.user_message() {
            warn!(%error, "surfacing error");
            self.error = Some(message);
        }
    }

    /// What the user-facing surface shows
    pub fn snapshot(&self) -> AssistantSnapshot {
        AssistantSnapshot {
            status: self.status,
            speaking: self.speaking && self.status == SessionStatus::Connected,
            listening: self.listener_active,
            permission: self.permission,
            error: self.error.clone(),
        }
    }
}

/// Whether the wake-word listener should be running right now
pub fn listener_wanted(state: &ArbiterState, capabilities: &Capabilities) -> bool {
    state.status == SessionStatus::Idle
        && state.permission == PermissionState::Granted
        && !state.connect_in_flight
        && !state.wake_word_pending
        && state.ambient_enabled
        && capabilities.can_listen_continuously
}

/// Published view of the assistant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssistantSnapshot {
    pub status: SessionStatus,
    pub speaking: bool,
    pub listening: bool,
    pub permission: PermissionState,
    pub error: Option<String>,
}
