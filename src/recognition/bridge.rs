//! Recognition engine fed by an external speech process
//!
//! The daemon does no audio work of its own. A companion process runs the
//! platform recognizer and forwards its results over the IPC socket; this
//! engine routes them to whichever recognizer handle is currently live and
//! drops them otherwise.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use super::engine::{
    HandleId, RecognitionEngine, RecognitionError, RecognizerConfig, RecognizerEvent,
    RecognizerHandle, RecognizerSink,
};

type ActiveSink = Arc<Mutex<Option<RecognizerSink>>>;

/// Engine whose recognizer lives in another process
#[derive(Clone)]
pub struct BridgeEngine {
    enabled: bool,
    active: ActiveSink,
}

impl BridgeEngine {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Route an event from the external recognizer.
    ///
    /// Returns false when no recognizer is live, in which case the event is
    /// dropped. An `End` event releases the live recognizer.
    pub fn feed(&self, event: RecognizerEvent) -> bool {
        let mut active = lock(&self.active);
        let Some(sink) = active.as_ref() else {
            debug!(?event, "no live recognizer, dropping bridged event");
            return false;
        };

        let delivered = sink.emit(event.clone());
        if event == RecognizerEvent::End || !delivered {
            *active = None;
        }
        delivered
    }

    /// Handle of the live recognizer, if any
    pub fn live_handle(&self) -> Option<HandleId> {
        lock(&self.active).as_ref().map(RecognizerSink::handle)
    }
}

impl RecognitionEngine for BridgeEngine {
    fn is_available(&self) -> bool {
        self.enabled
    }

    fn create(&self, config: &RecognizerConfig, sink: RecognizerSink) -> Box<dyn RecognizerHandle> {
        debug!(handle = %sink.handle(), language = %config.language, "bridged recognizer created");
        Box::new(BridgeHandle {
            sink,
            active: Arc::clone(&self.active),
            started: false,
        })
    }
}

struct BridgeHandle {
    sink: RecognizerSink,
    active: ActiveSink,
    started: bool,
}

impl RecognizerHandle for BridgeHandle {
    fn start(&mut self) -> Result<(), RecognitionError> {
        if self.started {
            return Err(RecognitionError::AlreadyRunning);
        }

        let mut active = lock(&self.active);
        if let Some(other) = active.as_ref() {
            warn!(live = %other.handle(), "bridged recognizer already live");
            return Err(RecognitionError::StartFailed(format!(
                "{} still owns the bridge",
                other.handle()
            )));
        }

        *active = Some(self.sink.clone());
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        if !self.started {
            return;
        }
        self.started = false;

        let mut active = lock(&self.active);
        let ours = active
            .as_ref()
            .is_some_and(|sink| sink.handle() == self.sink.handle());
        if ours {
            *active = None;
            self.sink.emit(RecognizerEvent::End);
        }
    }
}

fn lock(active: &ActiveSink) -> MutexGuard<'_, Option<RecognizerSink>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
