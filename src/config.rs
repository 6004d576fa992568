//! Configuration loading and management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Agent used when the settings file does not name one
pub const DEFAULT_AGENT_ID: &str = "agent_3901kc0mrg09f83ap5yznxdp160q";

/// Recognizer locale used when the settings file does not name one
pub const DEFAULT_LANGUAGE: &str = "en-US";

const SETTINGS_FILE: &str = "settings.json";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Remote agent to open sessions with; empty means "not configured"
    pub agent_id: String,

    /// Recognizer locale
    pub language: String,

    /// Wake phrases, `None` for the built-in list
    pub wake_phrases: Option<Vec<String>>,

    /// Force ambient listening on or off regardless of platform
    pub ambient_listening: Option<bool>,

    /// Whether the configured permission source grants the microphone
    pub microphone_access: bool,

    /// Connect latency of the simulated transport
    pub simulated_connect_latency: Duration,

    pub timings: Timings,
}

/// Delays used by the arbiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Debounce before restarting the listener once idle
    pub settle_delay_ms: u64,
    /// Pause between a wake-word match and the connect request
    pub handoff_delay_ms: u64,
    /// Minimum spacing between two listener starts
    pub restart_throttle_ms: u64,
    /// Delay before a finished recognizer handle is dropped
    pub handle_release_delay_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 400,
            handoff_delay_ms: 150,
            restart_throttle_ms: 1000,
            handle_release_delay_ms: 50,
        }
    }
}

impl Timings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn handoff_delay(&self) -> Duration {
        Duration::from_millis(self.handoff_delay_ms)
    }

    pub fn restart_throttle(&self) -> Duration {
        Duration::from_millis(self.restart_throttle_ms)
    }

    pub fn handle_release_delay(&self) -> Duration {
        Duration::from_millis(self.handle_release_delay_ms)
    }
}

/// On-disk settings, every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    agent_id: Option<String>,
    language: Option<String>,
    wake_phrases: Option<Vec<String>>,
    ambient_listening: Option<bool>,
    microphone_access: Option<bool>,
    simulated_connect_latency_ms: Option<u64>,
    timings: Option<Timings>,
}

impl Config {
    /// Load configuration from environment, settings file and defaults
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os("HEY_SANTA_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = std::env::var("HOME").context("HOME is not set")?;
                PathBuf::from(&home)
                    .join(".local")
                    .join("share")
                    .join("hey-santa")
            }
        };

        Self::from_data_dir(data_dir)
    }

    /// Build configuration rooted at `data_dir`, reading its settings file.
    ///
    /// A missing `agent_id` falls back to the built-in agent. An explicitly
    /// empty one is kept as-is, unlike the web client which treated an
    /// empty stored value as unset, so that toggling reports the
    /// missing-agent error instead of silently using the default agent.
    pub fn from_data_dir(data_dir: PathBuf) -> Result<Self> {
        let settings = read_settings(&data_dir.join(SETTINGS_FILE))?;
        let socket_path = data_dir.join("daemon.sock");

        Ok(Self {
            socket_path,
            data_dir,
            agent_id: settings
                .agent_id
                .map(|id| id.trim().to_string())
                .unwrap_or_else(|| DEFAULT_AGENT_ID.to_string()),
            language: settings
                .language
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            wake_phrases: settings.wake_phrases,
            ambient_listening: settings.ambient_listening,
            microphone_access: settings.microphone_access.unwrap_or(true),
            simulated_connect_latency: Duration::from_millis(
                settings.simulated_connect_latency_ms.unwrap_or(300),
            ),
            timings: settings.timings.unwrap_or_default(),
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn read_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid settings in {}", path.display()))
}
