//! protoscribe - hybrid transcription reconciliation
//!
//! Merges two asynchronous text producers for the same audio timeline — a
//! fast, lower-confidence local recognizer and a slower, higher-confidence
//! remote enhancement service — into one ordered, deduplicated, live
//! transcript. Enhancement failures retry with exponential backoff and
//! never lose the locally captured text.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod config;
pub mod defaults;
pub mod enhance;
pub mod error;
pub mod queue;
pub mod segment;
pub mod transcript;

// Core traits (segment in → enhanced transcript out)
pub use enhance::{EnhancementService, MockEnhancementService};
#[cfg(feature = "remote")]
pub use enhance::remote::HttpEnhancementService;

// Facade
pub use queue::TranscriptQueue;

// Data model
pub use segment::{Segment, SegmentInput, SegmentPatch, SegmentSource};
pub use transcript::state::{ReconciliationState, TranscriptStatistics};

// Error handling
pub use error::{ProtoscribeError, Result};

// Config
pub use config::ReconcilerConfig;
