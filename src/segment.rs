//! Transcript segment types.
//!
//! A [`Segment`] is the atomic unit of transcript content: one timestamped
//! span of text with a single authoritative source at any moment.

use crate::error::{ProtoscribeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts whitespace-delimited tokens in a text.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Which producer the segment's current text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentSource {
    /// Fast on-device recognizer; lower confidence, may still be improved.
    Local,
    /// Confirmed or improved by the remote enhancement service. Terminal.
    Enhanced,
}

/// One timestamped span of transcript text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Stable identifier for the lifetime of one utterance chunk.
    pub id: String,
    /// Current best-known text for this segment.
    pub text: String,
    /// Wall-clock time the segment was first observed.
    pub created_at: DateTime<Utc>,
    /// Offset in seconds into the recording timeline, once known.
    pub audio_start: Option<f64>,
    /// End offset in seconds; `audio_end >= audio_start` once both are set.
    pub audio_end: Option<f64>,
    /// Normalized confidence score in `[0, 1]`.
    pub confidence: f32,
    /// Producer of the current text.
    pub source: SegmentSource,
    /// Captured audio bytes, retained while enhancement may still need them.
    #[serde(skip)]
    pub audio_payload: Option<Vec<u8>>,
    /// Failed enhancement attempts so far. Reset only by a manual retry.
    pub retry_count: u32,
    /// True while an enhancement call is in flight.
    pub is_pending: bool,
    /// Cached whitespace-delimited token count of `text`.
    pub word_count: usize,
}

impl Segment {
    /// Replaces the text and refreshes the cached word count.
    pub fn set_text(&mut self, text: String) {
        self.word_count = count_words(&text);
        self.text = text;
    }

    /// Clone for publishing in derived state: the audio payload stays behind.
    pub fn without_payload(&self) -> Self {
        Self {
            audio_payload: None,
            ..self.clone()
        }
    }

    /// True once the segment has both time bounds.
    pub fn has_time_bounds(&self) -> bool {
        self.audio_start.is_some() && self.audio_end.is_some()
    }
}

/// Caller input for [`crate::queue::TranscriptQueue::add_segment`].
#[derive(Debug, Clone, Default)]
pub struct SegmentInput {
    /// Caller-assigned id; generated when absent.
    pub id: Option<String>,
    pub text: String,
    pub audio_start: Option<f64>,
    pub audio_end: Option<f64>,
    pub confidence: f32,
    pub source: Option<SegmentSource>,
    pub audio_payload: Option<Vec<u8>>,
}

impl SegmentInput {
    /// Creates a local-source input with the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_timing(mut self, audio_start: f64, audio_end: f64) -> Self {
        self.audio_start = Some(audio_start);
        self.audio_end = Some(audio_end);
        self
    }

    pub fn with_start(mut self, audio_start: f64) -> Self {
        self.audio_start = Some(audio_start);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_source(mut self, source: SegmentSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_payload(mut self, audio: Vec<u8>) -> Self {
        self.audio_payload = Some(audio);
        self
    }

    /// Rejects shapes that can only come from caller bugs.
    pub fn validate(&self) -> Result<()> {
        let id = self.id.clone().unwrap_or_default();
        if let (Some(start), Some(end)) = (self.audio_start, self.audio_end)
            && end < start
        {
            return Err(ProtoscribeError::InvalidSegment {
                id,
                message: format!("audio_end {end} precedes audio_start {start}"),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ProtoscribeError::InvalidSegment {
                id,
                message: format!("confidence {} outside [0, 1]", self.confidence),
            });
        }
        Ok(())
    }

    /// Materializes a fresh segment observed now.
    pub fn into_segment(self, id: String, created_at: DateTime<Utc>) -> Segment {
        let word_count = count_words(&self.text);
        Segment {
            id,
            text: self.text,
            created_at,
            audio_start: self.audio_start,
            audio_end: self.audio_end,
            confidence: self.confidence,
            source: self.source.unwrap_or(SegmentSource::Local),
            audio_payload: self.audio_payload,
            retry_count: 0,
            is_pending: false,
            word_count,
        }
    }
}

/// Partial update for [`crate::queue::TranscriptQueue::update_segment`].
///
/// Only the present fields are merged into the existing segment.
#[derive(Debug, Clone, Default)]
pub struct SegmentPatch {
    pub text: Option<String>,
    pub audio_start: Option<f64>,
    pub audio_end: Option<f64>,
    pub confidence: Option<f32>,
    pub audio_payload: Option<Vec<u8>>,
}

impl SegmentPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_timing(mut self, audio_start: f64, audio_end: f64) -> Self {
        self.audio_start = Some(audio_start);
        self.audio_end = Some(audio_end);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Same caller-bug screen as [`SegmentInput::validate`].
    pub fn validate(&self, id: &str) -> Result<()> {
        if let (Some(start), Some(end)) = (self.audio_start, self.audio_end)
            && end < start
        {
            return Err(ProtoscribeError::InvalidSegment {
                id: id.to_string(),
                message: format!("audio_end {end} precedes audio_start {start}"),
            });
        }
        if let Some(confidence) = self.confidence
            && !(0.0..=1.0).contains(&confidence)
        {
            return Err(ProtoscribeError::InvalidSegment {
                id: id.to_string(),
                message: format!("confidence {confidence} outside [0, 1]"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_words() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   "), 0);
        assert_eq!(count_words("hello"), 1);
        assert_eq!(count_words("  hello   world  "), 2);
    }

    #[test]
    fn test_input_into_segment_defaults() {
        let segment = SegmentInput::new("hello world")
            .with_confidence(0.6)
            .into_segment("seg-1".to_string(), Utc::now());

        assert_eq!(segment.id, "seg-1");
        assert_eq!(segment.word_count, 2);
        assert_eq!(segment.source, SegmentSource::Local);
        assert_eq!(segment.retry_count, 0);
        assert!(!segment.is_pending);
        assert!(segment.audio_payload.is_none());
    }

    #[test]
    fn test_input_validate_rejects_inverted_timing() {
        let input = SegmentInput::new("x").with_timing(5.0, 2.0);
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_input_validate_rejects_bad_confidence() {
        let input = SegmentInput::new("x").with_confidence(1.2);
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_patch_validate() {
        assert!(SegmentPatch::text("ok").validate("a").is_ok());
        assert!(
            SegmentPatch::text("ok")
                .with_timing(9.0, 3.0)
                .validate("a")
                .is_err()
        );
        assert!(
            SegmentPatch::text("ok")
                .with_confidence(-0.1)
                .validate("a")
                .is_err()
        );
    }

    #[test]
    fn test_set_text_refreshes_word_count() {
        let mut segment = SegmentInput::new("one two").into_segment("s".to_string(), Utc::now());
        assert_eq!(segment.word_count, 2);

        segment.set_text("one two three four".to_string());
        assert_eq!(segment.word_count, 4);
    }

    #[test]
    fn test_without_payload_drops_audio_only() {
        let segment = SegmentInput::new("hej")
            .with_payload(vec![1, 2, 3])
            .into_segment("s".to_string(), Utc::now());

        let published = segment.without_payload();
        assert!(published.audio_payload.is_none());
        assert_eq!(published.text, segment.text);
        assert_eq!(published.id, segment.id);
    }
}
