//! Arbitration between the wake-word listener and the remote session
//!
//! Conceptual states:
//! - NoMic: permission not granted, nothing runs on its own
//! - Idle+NoListener: waiting out the settle delay before listening again
//! - Idle+Listening: wake-word recognizer running
//! - Connecting / Connected / Disconnecting: the session owns the microphone

mod flags;
mod input;
mod machine;
mod timer;


pub use flags::{ArbiterState, AssistantSnapshot};
pub use input::Input;
pub use machine::{Arbiter, ArbiterSettings, Collaborators};
pub use timer::TimerSlot;
