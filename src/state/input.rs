//! Inputs delivered to the arbiter
//!
//! Every asynchronous signal is funneled through one channel so the arbiter
//! handles them strictly one at a time.

use crate::permission::PermissionOutcome;
use crate::recognition::{HandleId, RecognizerEvent};
use crate::session::{TransportError, TransportEvent};

/// Why a permission request was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOrigin {
    Startup,
    Toggle,
}

#[derive(Debug)]
pub enum Input {
    /// Manual connect/disconnect
    Toggle,
    /// End a live session, no-op otherwise
    EndSession,
    /// Clear the error banner, optionally retrying the toggle
    DismissError { retry: bool },
    /// User-controlled ambient listening switch
    SetWakeListening(bool),

    Recognizer {
        handle: HandleId,
        event: RecognizerEvent,
    },
    Transport(TransportEvent),

    PermissionResolved {
        outcome: PermissionOutcome,
        origin: PermissionOrigin,
    },
    SessionStarted(Result<(), TransportError>),
    SessionEnded(Result<(), TransportError>),

    RestartDue { generation: u64 },
    HandoffDue { generation: u64 },
    ReleaseDue { handle: HandleId, generation: u64 },

    Shutdown,
}
