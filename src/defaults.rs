//! Default configuration constants for protoscribe.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Default maximum words per segment before the segmenter splits it.
///
/// Local recognizers occasionally deliver one long final result for a whole
/// breath group. 12 words keeps segments caption-sized and gives the overlap
/// merger fine enough granularity to reorder against enhanced results.
pub const MAX_SEGMENT_WORDS: usize = 12;

/// Default overlap-merge threshold in seconds.
///
/// Two adjacent segments collapse into one when the gap between them is
/// smaller than this. 2 seconds tolerates the timing jitter between the
/// local recognizer's event clock and the audio capture clock.
pub const OVERLAP_THRESHOLD_SECS: f64 = 2.0;

/// Default number of automatic enhancement attempts per segment.
///
/// After this many failures the segment keeps its local text permanently
/// unless the caller issues a manual retry.
pub const MAX_ENHANCEMENT_RETRIES: u32 = 3;

/// Default base delay in milliseconds for enhancement retry backoff.
///
/// Attempt N waits `base * 2^(N-1)` before retrying: 1s, 2s, 4s.
pub const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Default cap on concurrent enhancement calls.
///
/// A burst of short utterances must not open unbounded network calls;
/// additional eligible segments queue until a slot frees.
pub const MAX_CONCURRENT_ENHANCEMENTS: usize = 3;

/// Confidence assigned to a segment once the remote service confirms it.
///
/// The service is trusted once it returns non-degenerate content, so the
/// value is fixed rather than taken from the response.
pub const ENHANCED_CONFIDENCE: f32 = 0.95;

/// Minimum character count for a normalized enhancement result.
///
/// Anything shorter is recognizer noise and is discarded as degenerate.
pub const MIN_MEANINGFUL_CHARS: usize = 3;

/// Longest run of one repeated character the normalizer preserves.
///
/// Runs longer than this collapse to a single occurrence ("hmmmmm" noise
/// artifacts); "..." and legitimate doubled letters survive.
pub const MAX_CHAR_RUN: usize = 3;

/// Number of trailing sentence-like chunks kept for caption display.
pub const RECENT_LINE_COUNT: usize = 2;

/// Default buffer size for the reducer command channel.
pub const CHANNEL_CAPACITY: usize = 100;
