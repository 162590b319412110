//! Derived transcript state.
//!
//! [`ReconciliationState`] is rebuilt deterministically from the segment
//! collection on every change and republished to subscribers; nothing in it
//! is mutated incrementally.

use crate::segment::{Segment, SegmentSource};
use serde::{Deserialize, Serialize};

/// Snapshot of the reconciled transcript, published on every change.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReconciliationState {
    /// Timeline-ordered segments after overlap merging. Payload-free.
    pub segments: Vec<Segment>,
    /// Space-joined text of all segments in order.
    pub full_transcript: String,
    /// Last sentence-like chunks of the transcript, for caption display.
    pub recent_lines: Vec<String>,
    /// Segments with an enhancement call in flight.
    pub pending_count: usize,
    /// Total whitespace-delimited tokens across the transcript.
    pub total_word_count: usize,
    /// Mean segment confidence, 0 when the transcript is empty.
    pub average_confidence: f32,
}

impl ReconciliationState {
    /// The state of a freshly started session.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no segments have been observed.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Aggregate counters over the authoritative (pre-merge) segment collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct TranscriptStatistics {
    pub total_segments: usize,
    pub local_segments: usize,
    pub enhanced_segments: usize,
    /// Segments with an enhancement call in flight.
    pub pending_segments: usize,
    /// Local segments whose automatic retry budget is exhausted.
    pub failed_segments: usize,
    pub total_word_count: usize,
    pub average_confidence: f32,
}

impl TranscriptStatistics {
    /// Computes counters over the raw segment collection.
    pub fn from_segments<'a, I>(segments: I, max_retries: u32) -> Self
    where
        I: IntoIterator<Item = &'a Segment>,
    {
        let mut stats = Self::default();
        let mut confidence_sum = 0.0f32;

        for segment in segments {
            stats.total_segments += 1;
            stats.total_word_count += segment.word_count;
            confidence_sum += segment.confidence;
            match segment.source {
                SegmentSource::Local => {
                    stats.local_segments += 1;
                    if segment.retry_count >= max_retries && !segment.is_pending {
                        stats.failed_segments += 1;
                    }
                }
                SegmentSource::Enhanced => stats.enhanced_segments += 1,
            }
            if segment.is_pending {
                stats.pending_segments += 1;
            }
        }

        if stats.total_segments > 0 {
            stats.average_confidence = confidence_sum / stats.total_segments as f32;
        }
        stats
    }
}

/// Splits a transcript into its trailing sentence-like chunks.
///
/// Splits on terminal punctuation (`.`, `!`, `?`), drops empty fragments,
/// and keeps the last `count`. A transcript with no terminator yet is one
/// chunk.
pub fn recent_lines(full_transcript: &str, count: usize) -> Vec<String> {
    let mut lines: Vec<String> = full_transcript
        .split(['.', '!', '?'])
        .map(|fragment| fragment.trim().to_string())
        .filter(|fragment| !fragment.is_empty())
        .collect();

    if lines.len() > count {
        lines.drain(..lines.len() - count);
    }
    lines
}
