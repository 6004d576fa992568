//! Events module for assistant state changes
//!
//! Emitted by the arbiter whenever the user-facing surface changes, and
//! forwarded to subscribed IPC clients.

use serde::{Deserialize, Serialize};

use crate::permission::PermissionState;
use crate::session::SessionStatus;

/// Changes to the user-facing state of the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    /// Session status moved
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// Wake word listener turned on or off
    ListeningChanged { listening: bool },

    /// The agent started or stopped talking
    SpeakingChanged { speaking: bool },

    /// Microphone permission changed
    PermissionChanged { permission: PermissionState },

    /// A finalized transcript matched the wake phrase
    WakeWordDetected { transcript: String },

    /// A user-visible error message appeared
    ErrorRaised { message: String },

    /// The error message was dismissed or superseded by a new attempt
    ErrorCleared,
}

impl std::fmt::Display for StateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateEvent::StatusChanged { from, to } => write!(f, "STATUS_CHANGED ({} -> {})", from, to),
            StateEvent::ListeningChanged { listening } => {
                write!(f, "LISTENING_CHANGED ({})", listening)
            }
            StateEvent::SpeakingChanged { speaking } => write!(f, "SPEAKING_CHANGED ({})", speaking),
            StateEvent::PermissionChanged { permission } => {
                write!(f, "PERMISSION_CHANGED ({})", permission)
            }
            StateEvent::WakeWordDetected { transcript } => {
                write!(f, "WAKE_WORD_DETECTED ({:?})", transcript)
            }
            StateEvent::ErrorRaised { message } => write!(f, "ERROR_RAISED ({})", message),
            StateEvent::ErrorCleared => write!(f, "ERROR_CLEARED"),
        }
    }
}
