//! Single-slot deferred inputs

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::input::Input;

/// At most one pending timer; scheduling replaces whatever was pending.
///
/// A firing carries the generation it was scheduled under. Firings that
/// were already queued when the slot was cancelled or rescheduled fail
/// [`TimerSlot::claim`] and must be ignored.
#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `make(generation)` after `delay`, superseding any pending firing
    pub fn schedule<F>(&mut self, delay: Duration, inputs: &mpsc::UnboundedSender<Input>, make: F)
    where
        F: FnOnce(u64) -> Input + Send + 'static,
    {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let inputs = inputs.clone();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inputs.send(make(generation));
        }));
    }

    /// Drop the pending firing; returns whether one was pending
    pub fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Accept a firing if it is the one currently pending
    pub fn claim(&mut self, generation: u64) -> bool {
        if self.task.is_some() && generation == self.generation {
            self.task = None;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
