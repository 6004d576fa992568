//! Speech recognition seam
//!
//! The recognition engine is a black box: it can be asked whether it is
//! available, and it hands out recognizer handles that report transcripts,
//! errors and their own end through a [`RecognizerSink`].

mod bridge;
mod engine;

pub use bridge::BridgeEngine;
pub use engine::{
    HandleId, RecognitionEngine, RecognitionErrorKind, RecognizerConfig, RecognizerEvent,
    RecognizerHandle, RecognizerSink, TranscriptResult,
};

#[cfg(test)]
pub use engine::RecognitionError;
