//! Recognition engine traits and event types

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::state::Input;

/// Identifies one recognizer instance for the lifetime of the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleId(pub u64);

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "recognizer#{}", self.0)
    }
}

/// How a recognizer is configured when it is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerConfig {
    pub continuous: bool,
    pub interim_results: bool,
    pub language: String,
}

impl RecognizerConfig {
    /// Continuous, interim-inclusive capture in a single locale
    pub fn wake_word(language: impl Into<String>) -> Self {
        Self {
            continuous: true,
            interim_results: true,
            language: language.into(),
        }
    }
}

/// One transcript result as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptResult {
    pub is_final: bool,
    /// Most likely transcript
    pub transcript: String,
    /// Lower-ranked alternatives, best first
    pub alternatives: Vec<String>,
}

impl TranscriptResult {
    pub fn new(transcript: impl Into<String>, is_final: bool) -> Self {
        Self {
            is_final,
            transcript: transcript.into(),
            alternatives: Vec::new(),
        }
    }

    pub fn with_alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.alternatives = alternatives;
        self
    }
}

/// Error codes a recognizer reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Microphone permission refused or revoked
    NotAllowed,
    /// The recognition service itself is disallowed
    ServiceNotAllowed,
    /// Raised after an intentional stop
    Aborted,
    Network,
    NoSpeech,
    AudioCapture,
    Other(String),
}

impl RecognitionErrorKind {
    /// Parse an engine error code such as `not-allowed`
    pub fn parse(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "not-allowed" => Self::NotAllowed,
            "service-not-allowed" => Self::ServiceNotAllowed,
            "aborted" => Self::Aborted,
            "network" => Self::Network,
            "no-speech" => Self::NoSpeech,
            "audio-capture" => Self::AudioCapture,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether this error means microphone permission is gone
    pub fn revokes_permission(&self) -> bool {
        matches!(self, Self::NotAllowed)
    }
}

impl std::fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAllowed => write!(f, "not-allowed"),
            Self::ServiceNotAllowed => write!(f, "service-not-allowed"),
            Self::Aborted => write!(f, "aborted"),
            Self::Network => write!(f, "network"),
            Self::NoSpeech => write!(f, "no-speech"),
            Self::AudioCapture => write!(f, "audio-capture"),
            Self::Other(code) => write!(f, "{}", code),
        }
    }
}

/// Events a recognizer emits after it has been started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    Result(TranscriptResult),
    Error(RecognitionErrorKind),
    /// The recognizer stopped, for any reason
    End,
}

/// Errors from starting a recognizer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognitionError {
    #[error("recognizer is already running")]
    AlreadyRunning,

    #[error("recognizer failed to start: {0}")]
    StartFailed(String),
}

/// Where a recognizer delivers its events
#[derive(Debug, Clone)]
pub struct RecognizerSink {
    handle: HandleId,
    tx: mpsc::UnboundedSender<Input>,
}

impl RecognizerSink {
    pub fn new(handle: HandleId, tx: mpsc::UnboundedSender<Input>) -> Self {
        Self { handle, tx }
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    /// Deliver an event; returns false once the arbiter is gone
    pub fn emit(&self, event: RecognizerEvent) -> bool {
        self.tx
            .send(Input::Recognizer {
                handle: self.handle,
                event,
            })
            .is_ok()
    }
}

/// A speech recognition capability
pub trait RecognitionEngine: Send + Sync {
    /// Whether recognition exists on this platform at all
    fn is_available(&self) -> bool;

    /// Build a recognizer that reports into `sink`. Nothing is captured
    /// until [`RecognizerHandle::start`] is called.
    fn create(&self, config: &RecognizerConfig, sink: RecognizerSink) -> Box<dyn RecognizerHandle>;
}

/// One live recognizer instance
pub trait RecognizerHandle: Send {
    fn start(&mut self) -> Result<(), RecognitionError>;

    /// Ask the recognizer to stop. It reports `End` once it has.
    fn stop(&mut self);
}
