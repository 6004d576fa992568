//! Platform capability query
//!
//! Mobile targets cannot keep a recognizer running in the background and
//! only allow the permission prompt from a user gesture, so they rely on
//! manual activation exclusively.

use serde::Serialize;

/// What the current platform allows the arbiter to do on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Ambient wake-word listening is reliable here
    pub can_listen_continuously: bool,
    /// The permission prompt may be shown without a user gesture
    pub can_prompt_permission: bool,
}

impl Capabilities {
    pub const DESKTOP: Self = Self {
        can_listen_continuously: true,
        can_prompt_permission: true,
    };

    pub const MOBILE: Self = Self {
        can_listen_continuously: false,
        can_prompt_permission: false,
    };

    /// Capabilities of the platform this binary was built for
    pub fn detect() -> Self {
        if cfg!(any(target_os = "android", target_os = "ios")) {
            Self::MOBILE
        } else {
            Self::DESKTOP
        }
    }

    /// Apply the `ambient_listening` setting, if one was given
    pub fn with_ambient_override(mut self, ambient: Option<bool>) -> Self {
        if let Some(enabled) = ambient {
            self.can_listen_continuously = enabled;
        }
        self
    }
}
