//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::StateEvent;
use crate::permission::PermissionState;
use crate::session::SessionStatus;
use crate::state::AssistantSnapshot;

/// Requests from clients to daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current assistant status
    GetStatus,

    /// The manual trigger: connect when idle, disconnect when connected
    Toggle,

    /// End a live session
    EndSession,

    /// Dismiss the error banner, optionally retrying
    DismissError {
        #[serde(default)]
        retry: bool,
    },

    /// Turn ambient wake-word listening on or off
    SetWakeListening { enabled: bool },

    /// Transcript from the external recognizer
    Transcript {
        text: String,
        is_final: bool,
        #[serde(default)]
        alternatives: Vec<String>,
    },

    /// Error code from the external recognizer
    RecognizerError { kind: String },

    /// The external recognizer stopped on its own
    RecognizerEnded,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to state change notifications
    Subscribe,
}

/// Responses from daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current assistant status
    Status(AssistantStatus),

    /// Request handed to the assistant
    Accepted,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    StateEvent { event: StateEvent },
}

/// Full assistant status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantStatus {
    /// Daemon version
    pub version: String,

    pub status: SessionStatus,

    /// The agent is talking
    pub speaking: bool,

    /// Wake word listener running
    pub listening: bool,

    pub permission: PermissionState,

    /// Dismissible error message
    pub error: Option<String>,

    pub agent_id: String,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl AssistantStatus {
    pub fn from_snapshot(snapshot: &AssistantSnapshot, agent_id: &str, uptime_secs: u64) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: snapshot.status,
            speaking: snapshot.speaking,
            listening: snapshot.listening,
            permission: snapshot.permission,
            error: snapshot.error.clone(),
            agent_id: agent_id.to_string(),
            uptime_secs,
        }
    }
}
