//! The authoritative segment collection and its derived state.
//!
//! All mutation goes through the single reducer task in [`crate::queue`];
//! the store itself is plain single-threaded data. Reads re-derive the full
//! [`ReconciliationState`] from scratch so ordering and merging never depend
//! on completion order.

use crate::config::ReconcilerConfig;
use crate::segment::{Segment, SegmentPatch, SegmentSource};
use crate::transcript::merge::{merge_overlapping, order_segments};
use crate::transcript::state::{ReconciliationState, TranscriptStatistics, recent_lines};
use std::collections::HashMap;

pub struct ReconciliationStore {
    segments: HashMap<String, Segment>,
    config: ReconcilerConfig,
}

impl ReconciliationStore {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            segments: HashMap::new(),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Segment> {
        self.segments.get(id)
    }

    /// Inserts a segment, or replaces an existing one with the same id.
    ///
    /// Replacement preserves `created_at` (first-observed time), the retry
    /// bookkeeping, and a retained payload the new segment does not carry.
    /// An `enhanced` segment only accepts timing refinements from a local
    /// replacement; its text, confidence, and source stay authoritative.
    pub fn upsert(&mut self, mut segment: Segment) {
        match self.segments.get_mut(&segment.id) {
            Some(existing) => {
                if existing.source == SegmentSource::Enhanced
                    && segment.source == SegmentSource::Local
                {
                    if segment.audio_start.is_some() {
                        existing.audio_start = segment.audio_start;
                    }
                    if segment.audio_end.is_some() {
                        existing.audio_end = segment.audio_end;
                    }
                    return;
                }
                segment.created_at = existing.created_at;
                segment.retry_count = existing.retry_count;
                segment.is_pending = existing.is_pending;
                if segment.audio_payload.is_none() {
                    segment.audio_payload = existing.audio_payload.take();
                }
                *existing = segment;
            }
            None => {
                self.segments.insert(segment.id.clone(), segment);
            }
        }
    }

    /// Merges patch fields into an existing segment.
    ///
    /// Returns false (a no-op, not an error) when the id is unknown; callers
    /// may race with `clear()`. The enhanced-text guard from [`Self::upsert`]
    /// applies here too.
    pub fn apply_patch(&mut self, id: &str, patch: SegmentPatch) -> bool {
        let Some(segment) = self.segments.get_mut(id) else {
            return false;
        };

        let enhanced = segment.source == SegmentSource::Enhanced;
        if let Some(text) = patch.text
            && !enhanced
        {
            segment.set_text(text);
        }
        if let Some(confidence) = patch.confidence
            && !enhanced
        {
            segment.confidence = confidence;
        }
        if let Some(start) = patch.audio_start {
            segment.audio_start = Some(start);
        }
        if let Some(end) = patch.audio_end {
            segment.audio_end = Some(end);
        }
        if let Some(payload) = patch.audio_payload
            && !enhanced
        {
            segment.audio_payload = Some(payload);
        }
        true
    }

    /// Takes the audio payload out of a segment, leasing it to the pipeline.
    pub fn take_payload(&mut self, id: &str) -> Option<Vec<u8>> {
        self.segments.get_mut(id)?.audio_payload.take()
    }

    pub fn set_pending(&mut self, id: &str, pending: bool) -> bool {
        match self.segments.get_mut(id) {
            Some(segment) => {
                segment.is_pending = pending;
                true
            }
            None => false,
        }
    }

    /// Records one failed enhancement attempt; returns the new retry count.
    pub fn record_attempt_failure(&mut self, id: &str) -> Option<u32> {
        let segment = self.segments.get_mut(id)?;
        segment.retry_count += 1;
        Some(segment.retry_count)
    }

    /// Marks a segment permanently failed and returns its leased payload so
    /// a later manual retry still has audio to resubmit.
    pub fn settle_failure(&mut self, id: &str, payload: Option<Vec<u8>>) {
        if let Some(segment) = self.segments.get_mut(id) {
            segment.retry_count = self.config.max_enhancement_retries;
            segment.is_pending = false;
            if segment.audio_payload.is_none() {
                segment.audio_payload = payload;
            }
        }
    }

    /// Clears the pending flag after a degenerate result: no improvement,
    /// not a failure, local text stands.
    pub fn settle_degenerate(&mut self, id: &str) {
        if let Some(segment) = self.segments.get_mut(id) {
            segment.is_pending = false;
        }
    }

    /// Folds a successful enhancement into the segment. The leased payload
    /// is gone for good; `enhanced` is terminal.
    pub fn apply_enhancement(&mut self, id: &str, text: String) -> bool {
        let Some(segment) = self.segments.get_mut(id) else {
            return false;
        };
        segment.set_text(text);
        segment.source = SegmentSource::Enhanced;
        segment.confidence = self.config.enhanced_confidence;
        segment.is_pending = false;
        segment.audio_payload = None;
        true
    }

    /// Resets retry bookkeeping for a manual retry and takes the payload.
    ///
    /// Returns `None` when the segment is unknown, already enhanced, or has
    /// no audio to resubmit.
    pub fn begin_manual_retry(&mut self, id: &str) -> Option<Vec<u8>> {
        let segment = self.segments.get_mut(id)?;
        if segment.source == SegmentSource::Enhanced {
            return None;
        }
        let payload = segment.audio_payload.take()?;
        segment.retry_count = 0;
        segment.is_pending = false;
        Some(payload)
    }

    /// Drops every segment; the start of a new recording session.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Rebuilds the published state from the segment collection.
    pub fn derive(&self) -> ReconciliationState {
        let mut ordered: Vec<Segment> = self.segments.values().map(Segment::without_payload).collect();
        order_segments(&mut ordered);
        let merged = merge_overlapping(ordered, self.config.overlap_threshold_secs);

        let full_transcript = merged
            .iter()
            .map(|s| s.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let stats = self.statistics();

        ReconciliationState {
            recent_lines: recent_lines(&full_transcript, self.config.recent_line_count),
            full_transcript,
            segments: merged,
            pending_count: stats.pending_segments,
            total_word_count: stats.total_word_count,
            average_confidence: stats.average_confidence,
        }
    }

    /// Aggregate counters over the raw (pre-merge) collection.
    pub fn statistics(&self) -> TranscriptStatistics {
        TranscriptStatistics::from_segments(
            self.segments.values(),
            self.config.max_enhancement_retries,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentInput;
    use chrono::Utc;

    fn store() -> ReconciliationStore {
        ReconciliationStore::new(ReconcilerConfig::default())
    }

    fn local(id: &str, text: &str, start: f64, end: f64) -> Segment {
        SegmentInput::new(text)
            .with_timing(start, end)
            .with_confidence(0.5)
            .into_segment(id.to_string(), Utc::now())
    }

    #[test]
    fn test_upsert_inserts_and_replaces() {
        let mut store = store();
        store.upsert(local("a", "interim text", 0.0, 2.0));
        assert_eq!(store.len(), 1);

        store.upsert(local("a", "final text", 0.0, 2.5));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().text, "final text");
    }

    #[test]
    fn test_replace_preserves_created_at() {
        let mut store = store();
        let first = local("a", "interim", 0.0, 2.0);
        let created = first.created_at;
        store.upsert(first);

        let mut replacement = local("a", "final", 0.0, 2.0);
        replacement.created_at = created + chrono::Duration::seconds(5);
        store.upsert(replacement);

        assert_eq!(store.get("a").unwrap().created_at, created);
    }

    #[test]
    fn test_replace_keeps_retained_payload() {
        let mut store = store();
        let mut first = local("a", "interim", 0.0, 2.0);
        first.audio_payload = Some(vec![1, 2, 3]);
        store.upsert(first);

        store.upsert(local("a", "final", 0.0, 2.0));
        assert_eq!(store.get("a").unwrap().audio_payload, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_enhanced_segment_resists_local_replacement() {
        let mut store = store();
        store.upsert(local("a", "hej", 0.0, 2.0));
        assert!(store.apply_enhancement("a", "Hej!".to_string()));

        store.upsert(local("a", "hej again", 0.5, 2.5));
        let segment = store.get("a").unwrap();
        assert_eq!(segment.text, "Hej!");
        assert_eq!(segment.source, SegmentSource::Enhanced);
        // Timing refinements are still accepted
        assert_eq!(segment.audio_start, Some(0.5));
        assert_eq!(segment.audio_end, Some(2.5));
    }

    #[test]
    fn test_patch_unknown_id_is_noop() {
        let mut store = store();
        assert!(!store.apply_patch("ghost", SegmentPatch::text("boo")));
    }

    #[test]
    fn test_patch_merges_fields() {
        let mut store = store();
        store.upsert(local("a", "one two", 0.0, 2.0));

        store.apply_patch("a", SegmentPatch::text("one two three").with_confidence(0.8));
        let segment = store.get("a").unwrap();
        assert_eq!(segment.text, "one two three");
        assert_eq!(segment.word_count, 3);
        assert!((segment.confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_patch_text_on_enhanced_is_ignored() {
        let mut store = store();
        store.upsert(local("a", "hej", 0.0, 2.0));
        store.apply_enhancement("a", "Hej!".to_string());

        store.apply_patch("a", SegmentPatch::text("overwrite"));
        assert_eq!(store.get("a").unwrap().text, "Hej!");
    }

    #[test]
    fn test_apply_enhancement_settles_segment() {
        let mut store = store();
        let mut segment = local("a", "hej", 0.0, 2.0);
        segment.audio_payload = Some(vec![9]);
        segment.is_pending = true;
        store.upsert(segment);

        assert!(store.apply_enhancement("a", "Hej!".to_string()));
        let segment = store.get("a").unwrap();
        assert_eq!(segment.text, "Hej!");
        assert_eq!(segment.source, SegmentSource::Enhanced);
        assert!((segment.confidence - 0.95).abs() < f32::EPSILON);
        assert!(!segment.is_pending);
        assert!(segment.audio_payload.is_none());
    }

    #[test]
    fn test_settle_failure_restores_payload_and_caps_retries() {
        let mut store = store();
        let mut segment = local("a", "kept", 0.0, 2.0);
        segment.is_pending = true;
        store.upsert(segment);

        store.settle_failure("a", Some(vec![7, 7]));
        let segment = store.get("a").unwrap();
        assert_eq!(segment.retry_count, 3);
        assert!(!segment.is_pending);
        assert_eq!(segment.text, "kept");
        assert_eq!(segment.audio_payload, Some(vec![7, 7]));
    }

    #[test]
    fn test_begin_manual_retry_resets_and_leases() {
        let mut store = store();
        let mut segment = local("a", "kept", 0.0, 2.0);
        segment.audio_payload = Some(vec![1]);
        segment.retry_count = 3;
        store.upsert(segment);

        let payload = store.begin_manual_retry("a");
        assert_eq!(payload, Some(vec![1]));
        let segment = store.get("a").unwrap();
        assert_eq!(segment.retry_count, 0);
        assert!(segment.audio_payload.is_none());
    }

    #[test]
    fn test_begin_manual_retry_refuses_enhanced() {
        let mut store = store();
        let mut segment = local("a", "hej", 0.0, 2.0);
        segment.audio_payload = Some(vec![1]);
        store.upsert(segment);
        store.apply_enhancement("a", "Hej!".to_string());

        assert!(store.begin_manual_retry("a").is_none());
    }

    #[test]
    fn test_derive_orders_and_merges() {
        let mut store = store();
        store.upsert(local("b", "second", 10.0, 12.0));
        store.upsert(local("a", "first", 0.0, 2.0));
        store.upsert(local("c", "third", 11.0, 14.0));

        let state = store.derive();
        // b and c overlap and merge; a stands alone
        assert_eq!(state.segments.len(), 2);
        assert_eq!(state.full_transcript, "first second third");
        assert_eq!(state.total_word_count, 3);
    }

    #[test]
    fn test_derive_counts_pending_from_raw_collection() {
        let mut store = store();
        let mut a = local("a", "one", 0.0, 2.0);
        a.is_pending = true;
        let mut b = local("b", "two", 1.0, 3.0);
        b.is_pending = true;
        store.upsert(a);
        store.upsert(b);

        let state = store.derive();
        // The two raw segments merge into one for display...
        assert_eq!(state.segments.len(), 1);
        // ...but both in-flight calls are still counted.
        assert_eq!(state.pending_count, 2);
    }

    #[test]
    fn test_derive_strips_payloads() {
        let mut store = store();
        let mut segment = local("a", "one", 0.0, 2.0);
        segment.audio_payload = Some(vec![1; 512]);
        store.upsert(segment);

        let state = store.derive();
        assert!(state.segments[0].audio_payload.is_none());
        // The store itself still holds the bytes.
        assert!(store.get("a").unwrap().audio_payload.is_some());
    }

    #[test]
    fn test_clear_empties_store() {
        let mut store = store();
        store.upsert(local("a", "one", 0.0, 2.0));
        store.clear();
        assert!(store.is_empty());
        assert!(store.derive().is_empty());
    }
}
