//! Segment ordering and overlap merging.
//!
//! Display order is always re-derived from the audio timeline, never from
//! completion order; that is what lets a slow early segment's enhancement
//! slot in ahead of a fast later one. Neighbors closer than the overlap
//! threshold collapse into one segment before final assembly.

use crate::segment::Segment;
use std::cmp::Ordering;

/// Sorts segments ascending by `audio_start`, breaking ties by `created_at`
/// and then `id`. Segments without a start offset sort after anchored ones,
/// by creation sequence among themselves.
pub fn order_segments(segments: &mut [Segment]) {
    segments.sort_by(compare_timeline);
}

fn compare_timeline(a: &Segment, b: &Segment) -> Ordering {
    match (a.audio_start, b.audio_start) {
        (Some(x), Some(y)) => x
            .total_cmp(&y)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a
            .created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id)),
    }
}

/// Collapses temporally adjacent segments in a timeline-ordered sequence.
///
/// A segment merges into its predecessor when the gap between the
/// predecessor's end and its own start is smaller than `overlap_threshold`
/// seconds (overlapping spans have a negative gap and always merge). Merging
/// concatenates text with a single space, extends the end to the later of
/// the two, takes the higher confidence, and sums word counts. Segments
/// without time bounds never merge.
pub fn merge_overlapping(segments: Vec<Segment>, overlap_threshold: f64) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());

    for segment in segments {
        let absorb = match merged.last() {
            Some(prev) => match (prev.audio_end, segment.audio_start) {
                (Some(prev_end), Some(start)) => start - prev_end < overlap_threshold,
                _ => false,
            },
            None => false,
        };

        if absorb && let Some(prev) = merged.last_mut() {
            if !segment.text.is_empty() {
                if !prev.text.is_empty() {
                    prev.text.push(' ');
                }
                prev.text.push_str(&segment.text);
            }
            prev.audio_end = match (prev.audio_end, segment.audio_end) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (end, None) => end,
                (None, end) => end,
            };
            prev.confidence = prev.confidence.max(segment.confidence);
            prev.word_count += segment.word_count;
            prev.is_pending |= segment.is_pending;
        } else {
            merged.push(segment);
        }
    }

    merged
}
