//! Microphone permission state and the source that grants it

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Known microphone permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// Not asked yet
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionState::Unknown => write!(f, "Unknown"),
            PermissionState::Granted => write!(f, "Granted"),
            PermissionState::Denied => write!(f, "Denied"),
        }
    }
}

/// Result of a single permission request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied(String),
}

/// Something that can be asked for microphone access.
///
/// Requests are idempotent: asking again after a grant resolves to
/// `Granted` without prompting the user a second time.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn request_microphone(&self) -> PermissionOutcome;
}

/// Permission decided by the `microphone_access` setting
pub struct ConfiguredPermission {
    allowed: bool,
}

impl ConfiguredPermission {
    pub fn new(allowed: bool) -> Self {
        Self { allowed }
    }
}

#[async_trait]
impl PermissionSource for ConfiguredPermission {
    async fn request_microphone(&self) -> PermissionOutcome {
        debug!(allowed = self.allowed, "microphone permission requested");
        if self.allowed {
            PermissionOutcome::Granted
        } else {
            PermissionOutcome::Denied("microphone access disabled in settings".to_string())
        }
    }
}
