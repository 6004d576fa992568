//! The arbiter
//!
//! Keeps the wake-word listener and the remote session mutually exclusive
//! over the microphone, debounces listener restarts, and reconciles state
//! after permission and transport failures.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Timings;
use crate::error::AssistantError;
use crate::events::StateEvent;
use crate::permission::{PermissionOutcome, PermissionSource, PermissionState};
use crate::platform::Capabilities;
use crate::recognition::{HandleId, RecognitionEngine, RecognizerConfig, RecognizerEvent};
use crate::session::{SessionController, SessionStatus, SessionTransport, ToggleOutcome};
use crate::wake::{StartOutcome, TranscriptOutcome, WakePhraseMatcher, WakeWordListener};

use super::flags::{listener_wanted, ArbiterState, AssistantSnapshot};
use super::input::{Input, PermissionOrigin};
use super::timer::TimerSlot;

/// The external engines the arbiter drives
pub struct Collaborators {
    pub recognition: Arc<dyn RecognitionEngine>,
    pub transport: Arc<dyn SessionTransport>,
    pub permission: Arc<dyn PermissionSource>,
}

/// Fixed parameters of one arbiter
#[derive(Debug, Clone)]
pub struct ArbiterSettings {
    pub agent_id: String,
    pub language: String,
    pub wake_phrases: Option<Vec<String>>,
    pub capabilities: Capabilities,
    pub timings: Timings,
}

/// Inputs the reconciliation rule depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Conditions {
    status: SessionStatus,
    permission: PermissionState,
    connect_in_flight: bool,
    wake_word_pending: bool,
    listener_active: bool,
    handle_held: bool,
    ambient_enabled: bool,
}

pub struct Arbiter {
    state: ArbiterState,
    capabilities: Capabilities,
    timings: Timings,
    listener: WakeWordListener,
    session: SessionController,
    permission: Arc<dyn PermissionSource>,
    inputs: mpsc::UnboundedSender<Input>,
    /// Deferred listener restart
    restart: TimerSlot,
    /// Wake-word match to connect request
    handoff: TimerSlot,
    last_conditions: Option<Conditions>,
    published: AssistantSnapshot,
    snapshot_tx: watch::Sender<AssistantSnapshot>,
    event_tx: broadcast::Sender<StateEvent>,
}

impl Arbiter {
    /// Create an arbiter. `inputs` must feed the receiver later given to
    /// [`Arbiter::run`]; collaborators' sinks should use the same channel.
    pub fn new(
        settings: ArbiterSettings,
        collaborators: Collaborators,
        inputs: mpsc::UnboundedSender<Input>,
        event_tx: broadcast::Sender<StateEvent>,
    ) -> Self {
        let matcher = match &settings.wake_phrases {
            Some(phrases) => WakePhraseMatcher::new(phrases),
            None => WakePhraseMatcher::default(),
        };
        let listener = WakeWordListener::new(
            collaborators.recognition,
            matcher,
            RecognizerConfig::wake_word(settings.language.clone()),
            inputs.clone(),
            settings.timings.handle_release_delay(),
        );
        let session = SessionController::new(
            collaborators.transport,
            settings.agent_id.clone(),
            inputs.clone(),
        );

        let state = ArbiterState::default();
        let published = state.snapshot();
        let (snapshot_tx, _) = watch::channel(published.clone());

        Self {
            state,
            capabilities: settings.capabilities,
            timings: settings.timings,
            listener,
            session,
            permission: collaborators.permission,
            inputs,
            restart: TimerSlot::new(),
            handoff: TimerSlot::new(),
            last_conditions: None,
            published,
            snapshot_tx,
            event_tx,
        }
    }

    pub fn agent_id(&self) -> &str {
        self.session.agent_id()
    }

    /// Watch the user-facing snapshot
    pub fn subscribe(&self) -> watch::Receiver<AssistantSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Run until [`Input::Shutdown`], then tear everything down
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<Input>) {
        info!(capabilities = ?self.capabilities, "arbiter started");
        self.start();

        while let Some(input) = inputs.recv().await {
            if matches!(input, Input::Shutdown) {
                break;
            }
            self.handle(input);
        }

        self.teardown().await;
        info!("arbiter stopped");
    }

    /// Ask for the microphone once at startup
    pub fn start(&mut self) {
        if self.capabilities.can_prompt_permission {
            self.request_permission(PermissionOrigin::Startup);
        } else {
            info!("waiting for a tap before asking for the microphone");
        }
        self.publish();
    }

    /// Handle one input and reconcile
    pub fn handle(&mut self, input: Input) {
        match input {
            Input::Toggle => self.toggle(),
            Input::EndSession => self.session.end_session(&mut self.state, &mut self.listener),
            Input::DismissError { retry } => {
                self.state.error = None;
                if retry {
                    self.toggle();
                }
            }
            Input::SetWakeListening(enabled) => {
                info!(enabled, "ambient listening switched");
                self.state.ambient_enabled = enabled;
            }
            Input::Recognizer { handle, event } => self.on_recognizer_event(handle, event),
            Input::Transport(event) => {
                self.session
                    .on_transport_event(&mut self.state, &mut self.listener, event)
            }
            Input::PermissionResolved { outcome, origin } => self.on_permission(outcome, origin),
            Input::SessionStarted(result) => self.session.on_start_finished(&mut self.state, result),
            Input::SessionEnded(result) => self.session.on_end_finished(&mut self.state, result),
            Input::RestartDue { generation } => {
                if self.restart.claim(generation) {
                    self.on_restart_due();
                }
            }
            Input::HandoffDue { generation } => {
                if self.handoff.claim(generation) {
                    self.on_handoff_due();
                }
            }
            Input::ReleaseDue { handle, generation } => {
                self.listener.on_release_due(handle, generation)
            }
            Input::Shutdown => {}
        }

        self.reconcile();
        self.publish();
    }

    fn toggle(&mut self) {
        self.state.error = None;
        if self.state.permission_request_in_flight {
            debug!("permission prompt pending, ignoring toggle");
            return;
        }

        let outcome = self.session.toggle(&mut self.state, &mut self.listener);
        debug!(?outcome, "toggle");
        if outcome == ToggleOutcome::PermissionRequired {
            self.request_permission(PermissionOrigin::Toggle);
        }
    }

    fn request_permission(&mut self, origin: PermissionOrigin) {
        if self.state.permission_request_in_flight {
            return;
        }
        self.state.permission_request_in_flight = true;
        debug!(?origin, "requesting microphone permission");

        let permission = Arc::clone(&self.permission);
        let inputs = self.inputs.clone();
        tokio::spawn(async move {
            let outcome = permission.request_microphone().await;
            let _ = inputs.send(Input::PermissionResolved { outcome, origin });
        });
    }

    fn on_permission(&mut self, outcome: PermissionOutcome, origin: PermissionOrigin) {
        self.state.permission_request_in_flight = false;

        match outcome {
            PermissionOutcome::Granted => {
                info!(?origin, "microphone permission granted");
                self.state.permission = PermissionState::Granted;
                if origin == PermissionOrigin::Startup {
                    self.try_start_listener();
                }
            }
            PermissionOutcome::Denied(reason) => {
                warn!(?origin, %reason, "microphone permission denied");
                self.state.raise(&AssistantError::PermissionPrompt(reason));
            }
        }
    }

    fn on_recognizer_event(&mut self, handle: HandleId, event: RecognizerEvent) {
        match event {
            RecognizerEvent::Result(result) => {
                let outcome = self.listener.on_result(&mut self.state, handle, &result);
                if let TranscriptOutcome::WakeWord(transcript) = outcome {
                    let _ = self.event_tx.send(StateEvent::WakeWordDetected { transcript });
                    self.handoff.schedule(
                        self.timings.handoff_delay(),
                        &self.inputs,
                        |generation| Input::HandoffDue { generation },
                    );
                }
            }
            RecognizerEvent::Error(kind) => self.listener.on_error(&mut self.state, handle, &kind),
            RecognizerEvent::End => self.listener.on_end(&mut self.state, handle),
        }
    }

    fn on_handoff_due(&mut self) {
        if self.state.status == SessionStatus::Idle && !self.state.connect_in_flight {
            self.toggle();
        } else {
            debug!(status = %self.state.status, "session already underway, dropping wake word");
        }
        self.state.wake_word_pending = false;
    }

    fn on_restart_due(&mut self) {
        if self.state.listener_active || !listener_wanted(&self.state, &self.capabilities) {
            return;
        }
        self.try_start_listener();
    }

    fn try_start_listener(&mut self) {
        if !listener_wanted(&self.state, &self.capabilities) {
            return;
        }

        let outcome = self.listener.start(
            &mut self.state,
            self.timings.restart_throttle(),
            Instant::now(),
        );
        if let StartOutcome::Throttled { retry_in } = outcome {
            debug!(retry_in_ms = retry_in.as_millis() as u64, "listener restart throttled");
            self.schedule_restart(retry_in);
        }
    }

    /// Bring the listener in line with the current conditions.
    ///
    /// Only a change in conditions (re)schedules or cancels the restart, so
    /// a burst of changes collapses into one restart timed from the last.
    fn reconcile(&mut self) {
        let wanted = listener_wanted(&self.state, &self.capabilities);
        if !wanted && self.state.listener_active {
            self.listener.stop(&mut self.state);
        }

        let conditions = Conditions {
            status: self.state.status,
            permission: self.state.permission,
            connect_in_flight: self.state.connect_in_flight,
            wake_word_pending: self.state.wake_word_pending,
            listener_active: self.state.listener_active,
            handle_held: self.listener.holds_handle(),
            ambient_enabled: self.state.ambient_enabled,
        };
        if self.last_conditions == Some(conditions) {
            return;
        }
        self.last_conditions = Some(conditions);

        if wanted && !self.state.listener_active {
            self.schedule_restart(self.timings.settle_delay());
        } else if self.restart.cancel() {
            debug!("pending listener restart cancelled");
        }
    }

    fn schedule_restart(&mut self, delay: std::time::Duration) {
        debug!(delay_ms = delay.as_millis() as u64, "listener restart scheduled");
        self.restart
            .schedule(delay, &self.inputs, |generation| Input::RestartDue { generation });
    }

    /// Diff against the last published snapshot and emit changes.
    ///
    /// The listener going quiet is reported before a status change and the
    /// listener coming back after it, so subscribers never see it overlap
    /// an active session.
    fn publish(&mut self) {
        let next = self.state.snapshot();
        if next == self.published {
            return;
        }
        let prev = std::mem::replace(&mut self.published, next.clone());

        let mut events = Vec::new();
        if prev.listening && !next.listening {
            events.push(StateEvent::ListeningChanged { listening: false });
        }
        if prev.permission != next.permission {
            events.push(StateEvent::PermissionChanged {
                permission: next.permission,
            });
        }
        if prev.status != next.status {
            events.push(StateEvent::StatusChanged {
                from: prev.status,
                to: next.status,
            });
        }
        if prev.speaking != next.speaking {
            events.push(StateEvent::SpeakingChanged {
                speaking: next.speaking,
            });
        }
        if !prev.listening && next.listening {
            events.push(StateEvent::ListeningChanged { listening: true });
        }
        if prev.error != next.error {
            events.push(match &next.error {
                Some(message) => StateEvent::ErrorRaised {
                    message: message.clone(),
                },
                None => StateEvent::ErrorCleared,
            });
        }

        for event in events {
            debug!(%event, "emitting state event");
            let _ = self.event_tx.send(event);
        }
        self.snapshot_tx.send_replace(next);
    }

    async fn teardown(&mut self) {
        self.restart.cancel();
        self.handoff.cancel();
        self.state.wake_word_pending = false;
        self.listener.shutdown(&mut self.state);
        self.session.shutdown(&mut self.state).await;
        self.publish();
    }
}
