//! Wake-word listener
//!
//! Owns at most one recognizer handle. It transcribes and reports matches
//! but never decides on its own whether a session may start; the arbiter
//! turns a match into a connect request after the handoff delay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::AssistantError;
use crate::permission::PermissionState;
use crate::recognition::{
    HandleId, RecognitionEngine, RecognitionErrorKind, RecognizerConfig, RecognizerHandle,
    RecognizerSink, TranscriptResult,
};
use crate::state::{ArbiterState, Input, TimerSlot};

use super::matcher::WakePhraseMatcher;

/// Why [`WakeWordListener::start`] did or did not start a recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(HandleId),
    /// No recognition on this platform
    Unavailable,
    ConnectInFlight,
    /// A previous recognizer has not been released yet
    HandleHeld,
    /// Started too recently; try again after `retry_in`
    Throttled { retry_in: Duration },
    Failed,
}

/// What a transcript result amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptOutcome {
    /// Interim, stale, or arriving after a stop
    Ignored,
    Heard,
    /// The wake phrase matched; the recognizer has been stopped
    WakeWord(String),
}

struct LiveRecognizer {
    id: HandleId,
    handle: Box<dyn RecognizerHandle>,
    stop_requested: bool,
}

pub struct WakeWordListener {
    engine: Arc<dyn RecognitionEngine>,
    matcher: WakePhraseMatcher,
    config: RecognizerConfig,
    inputs: mpsc::UnboundedSender<Input>,
    live: Option<LiveRecognizer>,
    next_handle: u64,
    release: TimerSlot,
    release_delay: Duration,
}

impl WakeWordListener {
    pub fn new(
        engine: Arc<dyn RecognitionEngine>,
        matcher: WakePhraseMatcher,
        config: RecognizerConfig,
        inputs: mpsc::UnboundedSender<Input>,
        release_delay: Duration,
    ) -> Self {
        Self {
            engine,
            matcher,
            config,
            inputs,
            live: None,
            next_handle: 1,
            release: TimerSlot::new(),
            release_delay,
        }
    }

    /// Whether a recognizer handle exists, running or winding down
    pub fn holds_handle(&self) -> bool {
        self.live.is_some()
    }

    pub fn live_handle(&self) -> Option<HandleId> {
        self.live.as_ref().map(|live| live.id)
    }

    /// Start a recognizer unless something forbids it right now
    pub fn start(&mut self, state: &mut ArbiterState, throttle: Duration, now: Instant) -> StartOutcome {
        if !self.engine.is_available() {
            debug!("speech recognition unavailable, wake word disabled");
            state.raise(&AssistantError::RecognitionUnavailable);
            return StartOutcome::Unavailable;
        }
        if state.connect_in_flight {
            return StartOutcome::ConnectInFlight;
        }
        if let Some(live) = &self.live {
            debug!(handle = %live.id, "recognizer handle still held");
            return StartOutcome::HandleHeld;
        }
        if let Some(last) = state.last_listener_start {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < throttle {
                return StartOutcome::Throttled {
                    retry_in: throttle - elapsed,
                };
            }
        }

        let id = HandleId(self.next_handle);
        self.next_handle += 1;

        let sink = RecognizerSink::new(id, self.inputs.clone());
        let mut handle = self.engine.create(&self.config, sink);
        state.last_listener_start = Some(now);

        match handle.start() {
            Ok(()) => {
                self.live = Some(LiveRecognizer {
                    id,
                    handle,
                    stop_requested: false,
                });
                state.listener_active = true;
                info!(handle = %id, language = %self.config.language, "wake word listener started");
                StartOutcome::Started(id)
            }
            Err(e) => {
                warn!(?e, "failed to start wake word recognizer");
                StartOutcome::Failed
            }
        }
    }

    /// Stop the live recognizer. Idempotent; no-op without a handle.
    pub fn stop(&mut self, state: &mut ArbiterState) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        state.listener_active = false;
        if live.stop_requested {
            return;
        }

        live.stop_requested = true;
        live.handle.stop();
        debug!(handle = %live.id, "wake word listener stopped");

        let id = live.id;
        self.schedule_release(id);
    }

    /// Handle a transcript result from recognizer `id`
    pub fn on_result(
        &mut self,
        state: &mut ArbiterState,
        id: HandleId,
        result: &TranscriptResult,
    ) -> TranscriptOutcome {
        let current = self
            .live
            .as_ref()
            .is_some_and(|live| live.id == id && !live.stop_requested);
        if !current || !result.is_final || state.wake_word_pending {
            return TranscriptOutcome::Ignored;
        }

        let transcript = result.transcript.trim().to_lowercase();
        debug!(%transcript, "heard");

        if !self.matcher.matches(&transcript) {
            return TranscriptOutcome::Heard;
        }

        info!(%transcript, "wake word detected");
        // Free the microphone before the session asks for it
        self.stop(state);
        state.wake_word_pending = true;
        TranscriptOutcome::WakeWord(transcript)
    }

    /// The recognizer stopped, for whatever reason
    pub fn on_end(&mut self, state: &mut ArbiterState, id: HandleId) {
        if self.live_handle() != Some(id) {
            debug!(handle = %id, "end from released recognizer");
            return;
        }

        info!(handle = %id, "wake word recognizer ended");
        state.listener_active = false;
        self.schedule_release(id);
    }

    pub fn on_error(&mut self, state: &mut ArbiterState, id: HandleId, kind: &RecognitionErrorKind) {
        if self.live_handle() != Some(id) {
            return;
        }

        if kind.revokes_permission() {
            warn!(handle = %id, "microphone permission revoked during recognition");
            state.permission = PermissionState::Denied;
            state.listener_active = false;
            return;
        }

        // Follows an intentional stop; `end` is on its way
        if *kind == RecognitionErrorKind::Aborted {
            debug!(handle = %id, "recognizer aborted");
            return;
        }

        warn!(handle = %id, error = %kind, "speech recognition error");
        state.raise(&AssistantError::RecognitionTransient(kind.clone()));
        state.listener_active = false;
    }

    /// A release timer fired
    pub fn on_release_due(&mut self, id: HandleId, generation: u64) {
        if !self.release.claim(generation) {
            return;
        }
        if self.live_handle() == Some(id) {
            debug!(handle = %id, "recognizer handle released");
            self.live = None;
        }
    }

    /// Stop and drop everything immediately
    pub fn shutdown(&mut self, state: &mut ArbiterState) {
        self.stop(state);
        self.release.cancel();
        self.live = None;
    }

    fn schedule_release(&mut self, id: HandleId) {
        self.release
            .schedule(self.release_delay, &self.inputs, move |generation| Input::ReleaseDue {
                handle: id,
                generation,
            });
    }
}
