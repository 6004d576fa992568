//! Error taxonomy for the assistant core
//!
//! Recognition-layer errors are absorbed by the arbiter and never reach the
//! user. Session-layer errors and the startup permission failure are turned
//! into a single dismissible message via [`AssistantError::user_message`].

use crate::recognition::RecognitionErrorKind;

/// Shown when the startup (or tap-triggered) permission prompt is refused
pub const PERMISSION_PROMPT_MESSAGE: &str = "Please allow microphone access to talk to Santa!";

/// Errors surfaced by the assistant core
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssistantError {
    /// Microphone access refused at the permission prompt
    #[error("microphone permission denied: {0}")]
    PermissionPrompt(String),

    /// Microphone access refused or revoked while starting a session
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    /// The platform has no speech recognition capability
    #[error("speech recognition is unavailable on this platform")]
    RecognitionUnavailable,

    /// Network blip, intentional abort and friends
    #[error("speech recognition error: {0}")]
    RecognitionTransient(RecognitionErrorKind),

    /// The remote session could not be started
    #[error("session failed to start: {0}")]
    SessionStart(String),

    /// The remote session failed mid-call
    #[error("session error: {0}")]
    SessionRuntime(String),

    /// No agent identifier is configured
    #[error("no agent identifier configured")]
    MissingAgent,
}

impl AssistantError {
    /// Classify a rejection from `start_session`.
    ///
    /// Browsers surface a revoked microphone as `NotAllowedError` or a
    /// "Permission denied" message, which must flip the permission state
    /// rather than read as a generic connection failure.
    pub fn classify_start_failure(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("notallowederror") || lower.contains("permission denied") {
            Self::PermissionDenied(message.to_string())
        } else {
            Self::SessionStart(message.to_string())
        }
    }

    /// Whether this error means the microphone is no longer usable
    pub fn revokes_permission(&self) -> bool {
        matches!(self, Self::PermissionPrompt(_) | Self::PermissionDenied(_))
    }

    /// The banner text for this error, if it is user-visible at all
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::PermissionPrompt(_) => Some(PERMISSION_PROMPT_MESSAGE.to_string()),
            Self::PermissionDenied(_) => {
                Some("Microphone access was denied. Please allow it in settings.".to_string())
            }
            Self::SessionStart(message) if !message.trim().is_empty() => Some(message.clone()),
            Self::SessionStart(_) => {
                Some("Failed to connect. Is the Agent ID correct?".to_string())
            }
            Self::SessionRuntime(message) if !message.trim().is_empty() => Some(message.clone()),
            Self::SessionRuntime(_) => {
                Some("The conversation was interrupted. Tap to try again.".to_string())
            }
            Self::MissingAgent => Some("Missing Agent ID. Please add it and try again.".to_string()),
            Self::RecognitionUnavailable | Self::RecognitionTransient(_) => None,
        }
    }
}
