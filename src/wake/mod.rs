//! Wake-word detection
//!
//! Wraps a continuous recognizer and classifies its finalized transcripts
//! against the wake phrase.

mod listener;
mod matcher;

pub use listener::{StartOutcome, TranscriptOutcome, WakeWordListener};
pub use matcher::WakePhraseMatcher;
