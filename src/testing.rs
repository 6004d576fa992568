//! Fake collaborators and a harness for driving the arbiter in tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::Timings;
use crate::events::StateEvent;
use crate::permission::{PermissionOutcome, PermissionSource};
use crate::platform::Capabilities;
use crate::recognition::{
    RecognitionEngine, RecognitionError, RecognitionErrorKind, RecognizerConfig, RecognizerEvent,
    RecognizerHandle, RecognizerSink, TranscriptResult,
};
use crate::session::{
    SessionConfig, SessionStatus, SessionTransport, TransportError, TransportEvent, TransportSink,
};
use crate::state::{Arbiter, ArbiterSettings, AssistantSnapshot, Collaborators, Input};

#[derive(Default)]
struct EngineLog {
    created: usize,
    started: usize,
    stopped: usize,
    outstanding: usize,
    max_outstanding: usize,
    live: Option<RecognizerSink>,
    configs: Vec<RecognizerConfig>,
}

/// Recognition engine that behaves like a browser recognizer: `stop()`
/// is followed by an `end` event.
pub struct FakeEngine {
    available: bool,
    log: Arc<Mutex<EngineLog>>,
}

impl FakeEngine {
    pub fn new(available: bool) -> Arc<Self> {
        Arc::new(Self {
            available,
            log: Arc::new(Mutex::new(EngineLog::default())),
        })
    }

    /// Deliver a finalized transcript to the live recognizer
    pub fn say(&self, text: &str) -> bool {
        self.emit(RecognizerEvent::Result(TranscriptResult::new(text, true)))
    }

    pub fn say_interim(&self, text: &str) -> bool {
        self.emit(RecognizerEvent::Result(TranscriptResult::new(text, false)))
    }

    pub fn fail(&self, kind: RecognitionErrorKind) -> bool {
        self.emit(RecognizerEvent::Error(kind))
    }

    /// The platform ended recognition on its own
    pub fn end_spontaneously(&self) -> bool {
        let sink = self.log.lock().unwrap().live.take();
        match sink {
            Some(sink) => sink.emit(RecognizerEvent::End),
            None => false,
        }
    }

    pub fn starts(&self) -> usize {
        self.log.lock().unwrap().started
    }

    pub fn stops(&self) -> usize {
        self.log.lock().unwrap().stopped
    }

    pub fn created(&self) -> usize {
        self.log.lock().unwrap().created
    }

    pub fn max_outstanding(&self) -> usize {
        self.log.lock().unwrap().max_outstanding
    }

    pub fn last_config(&self) -> Option<RecognizerConfig> {
        self.log.lock().unwrap().configs.last().cloned()
    }

    fn emit(&self, event: RecognizerEvent) -> bool {
        let sink = self.log.lock().unwrap().live.clone();
        match sink {
            Some(sink) => sink.emit(event),
            None => false,
        }
    }
}

impl RecognitionEngine for FakeEngine {
    fn is_available(&self) -> bool {
        self.available
    }

    fn create(&self, config: &RecognizerConfig, sink: RecognizerSink) -> Box<dyn RecognizerHandle> {
        let mut log = self.log.lock().unwrap();
        log.created += 1;
        log.outstanding += 1;
        log.max_outstanding = log.max_outstanding.max(log.outstanding);
        log.configs.push(config.clone());

        Box::new(FakeHandle {
            sink,
            log: Arc::clone(&self.log),
            started: false,
            stopped: false,
        })
    }
}

struct FakeHandle {
    sink: RecognizerSink,
    log: Arc<Mutex<EngineLog>>,
    started: bool,
    stopped: bool,
}

impl RecognizerHandle for FakeHandle {
    fn start(&mut self) -> Result<(), RecognitionError> {
        let mut log = self.log.lock().unwrap();
        if log.live.is_some() {
            return Err(RecognitionError::AlreadyRunning);
        }
        log.started += 1;
        log.live = Some(self.sink.clone());
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        if !self.started || self.stopped {
            return;
        }
        self.stopped = true;

        let mut log = self.log.lock().unwrap();
        log.stopped += 1;
        let ours = log
            .live
            .as_ref()
            .is_some_and(|live| live.handle() == self.sink.handle());
        if ours {
            log.live = None;
        }
        drop(log);
        self.sink.emit(RecognizerEvent::End);
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.outstanding -= 1;
    }
}

/// Transport that connects after a delay, or rejects with a set message
pub struct FakeTransport {
    sink: TransportSink,
    connect_delay: Duration,
    rejection: Mutex<Option<String>>,
    end_rejection: Mutex<Option<String>>,
    starts: AtomicUsize,
    ends: AtomicUsize,
}

impl FakeTransport {
    pub fn new(sink: TransportSink, connect_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            sink,
            connect_delay,
            rejection: Mutex::new(None),
            end_rejection: Mutex::new(None),
            starts: AtomicUsize::new(0),
            ends: AtomicUsize::new(0),
        })
    }

    pub fn reject_with(&self, message: Option<&str>) {
        *self.rejection.lock().unwrap() = message.map(str::to_string);
    }

    /// Make `end_session` fail without the remote side disconnecting
    pub fn reject_end_with(&self, message: Option<&str>) {
        *self.end_rejection.lock().unwrap() = message.map(str::to_string);
    }

    /// Push an event as if the remote side sent it
    pub fn push(&self, event: TransportEvent) {
        self.sink.emit(event);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn ends(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionTransport for FakeTransport {
    async fn start_session(&self, _config: SessionConfig) -> Result<(), TransportError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.connect_delay).await;

        let rejection = self.rejection.lock().unwrap().clone();
        if let Some(message) = rejection {
            return Err(TransportError::Rejected(message));
        }
        self.sink.emit(TransportEvent::Connected);
        Ok(())
    }

    async fn end_session(&self) -> Result<(), TransportError> {
        self.ends.fetch_add(1, Ordering::SeqCst);

        let rejection = self.end_rejection.lock().unwrap().clone();
        if let Some(message) = rejection {
            return Err(TransportError::Rejected(message));
        }
        self.sink.emit(TransportEvent::Disconnected);
        Ok(())
    }
}

/// Permission source whose answer can change between requests
pub struct FakePermission {
    granted: Mutex<bool>,
    requests: AtomicUsize,
}

impl FakePermission {
    pub fn new(granted: bool) -> Arc<Self> {
        Arc::new(Self {
            granted: Mutex::new(granted),
            requests: AtomicUsize::new(0),
        })
    }

    pub fn set_granted(&self, granted: bool) {
        *self.granted.lock().unwrap() = granted;
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionSource for FakePermission {
    async fn request_microphone(&self) -> PermissionOutcome {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if *self.granted.lock().unwrap() {
            PermissionOutcome::Granted
        } else {
            PermissionOutcome::Denied("NotAllowedError".to_string())
        }
    }
}

pub struct HarnessOptions {
    pub capabilities: Capabilities,
    pub permission_granted: bool,
    pub recognition_available: bool,
    pub agent_id: String,
    pub connect_delay: Duration,
    pub wake_phrases: Option<Vec<String>>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            capabilities: Capabilities::DESKTOP,
            permission_granted: true,
            recognition_available: true,
            agent_id: "agent_test".to_string(),
            connect_delay: Duration::from_millis(100),
            wake_phrases: None,
        }
    }
}

/// A running arbiter wired to fakes
pub struct Harness {
    pub inputs: mpsc::UnboundedSender<Input>,
    pub engine: Arc<FakeEngine>,
    pub transport: Arc<FakeTransport>,
    pub permission: Arc<FakePermission>,
    snapshot: watch::Receiver<AssistantSnapshot>,
    events: broadcast::Receiver<StateEvent>,
    seen: Vec<StateEvent>,
    task: JoinHandle<()>,
}

impl Harness {
    pub fn spawn(options: HarnessOptions) -> Self {
        let (inputs, inputs_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = broadcast::channel(256);

        let engine = FakeEngine::new(options.recognition_available);
        let transport = FakeTransport::new(TransportSink::new(inputs.clone()), options.connect_delay);
        let permission = FakePermission::new(options.permission_granted);

        let arbiter = Arbiter::new(
            ArbiterSettings {
                agent_id: options.agent_id,
                language: "en-US".to_string(),
                wake_phrases: options.wake_phrases,
                capabilities: options.capabilities,
                timings: Timings::default(),
            },
            Collaborators {
                recognition: engine.clone(),
                transport: transport.clone(),
                permission: permission.clone(),
            },
            inputs.clone(),
            event_tx,
        );
        let snapshot = arbiter.subscribe();
        let task = tokio::spawn(arbiter.run(inputs_rx));

        Self {
            inputs,
            engine,
            transport,
            permission,
            snapshot,
            events,
            seen: Vec::new(),
            task,
        }
    }

    pub fn send(&self, input: Input) {
        self.inputs.send(input).unwrap();
    }

    /// Let the paused clock run forward
    pub async fn advance(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    pub fn snapshot(&self) -> AssistantSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot().status
    }

    pub fn listening(&self) -> bool {
        self.snapshot().listening
    }

    /// Every state event emitted so far
    pub fn events(&mut self) -> &[StateEvent] {
        while let Ok(event) = self.events.try_recv() {
            self.seen.push(event);
        }
        &self.seen
    }

    /// Status transitions in order
    pub fn statuses(&mut self) -> Vec<SessionStatus> {
        self.events()
            .iter()
            .filter_map(|event| match event {
                StateEvent::StatusChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    /// Replay events and fail if the listener ever overlapped a session
    pub fn assert_exclusive(&mut self) {
        let mut listening = false;
        let mut status = SessionStatus::Idle;
        for event in self.events() {
            match event {
                StateEvent::ListeningChanged { listening: l } => listening = *l,
                StateEvent::StatusChanged { to, .. } => status = *to,
                _ => {}
            }
            assert!(
                !(listening
                    && matches!(status, SessionStatus::Connecting | SessionStatus::Connected)),
                "listener active while session is {}",
                status
            );
        }
    }

    pub async fn shutdown(self) {
        self.send(Input::Shutdown);
        self.task.await.unwrap();
    }
}
