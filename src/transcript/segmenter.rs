//! Segmenter for over-long local segments.
//!
//! Local recognizers sometimes deliver one long final result covering many
//! seconds of speech. Splitting it into bounded word-count chunks keeps the
//! transcript caption-sized and lets the overlap merger interleave enhanced
//! results at a useful granularity.

use crate::segment::{Segment, count_words};
use chrono::Duration as ChronoDuration;

/// Splits a segment into chunks of at most `max_words` words.
///
/// When the segment has both time bounds, a uniform words-per-second rate is
/// derived from them and every chunk receives a proportional, monotonic,
/// non-overlapping `audio_start`/`audio_end` slice. Without a known
/// duration, chunks carry no time bounds and order by creation sequence.
///
/// Chunk ids derive from the parent (`<id>-chunk-<index>`); `source` and
/// `confidence` are inherited. The parent's audio payload is not carried:
/// replaying the whole span's audio per chunk would duplicate text, so
/// holistic re-transcription is left to the full-recording path.
pub fn split_long_segment(segment: &Segment, max_words: usize) -> Vec<Segment> {
    let words: Vec<&str> = segment.text.split_whitespace().collect();
    if max_words == 0 || words.len() <= max_words {
        return vec![segment.without_payload()];
    }

    // Seconds per word when the time span is known and sane.
    let secs_per_word = match (segment.audio_start, segment.audio_end) {
        (Some(start), Some(end)) if end > start => Some((end - start) / words.len() as f64),
        _ => None,
    };

    let chunk_count = words.len().div_ceil(max_words);
    let mut chunks = Vec::with_capacity(chunk_count);

    for (index, chunk_words) in words.chunks(max_words).enumerate() {
        let first_word = index * max_words;
        let last_word = first_word + chunk_words.len();
        let is_last = index == chunk_count - 1;

        let (audio_start, audio_end) = match (secs_per_word, segment.audio_start) {
            (Some(rate), Some(start)) => {
                let chunk_start = start + first_word as f64 * rate;
                // Anchor the final chunk to the parent's end to avoid float drift.
                let chunk_end = if is_last {
                    segment.audio_end.unwrap_or(start + last_word as f64 * rate)
                } else {
                    start + last_word as f64 * rate
                };
                (Some(chunk_start), Some(chunk_end))
            }
            _ => (None, None),
        };

        let text = chunk_words.join(" ");
        chunks.push(Segment {
            id: format!("{}-chunk-{}", segment.id, index),
            word_count: count_words(&text),
            text,
            // Offset per chunk keeps creation-sequence ordering total even
            // when chunks carry no time bounds.
            created_at: segment.created_at + ChronoDuration::milliseconds(index as i64),
            audio_start,
            audio_end,
            confidence: segment.confidence,
            source: segment.source,
            audio_payload: None,
            retry_count: 0,
            is_pending: false,
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{SegmentInput, SegmentSource};
    use chrono::Utc;

    fn make_segment(words: usize, start: f64, end: f64) -> Segment {
        let text = (0..words).map(|i| format!("w{i}")).collect::<Vec<_>>();
        SegmentInput::new(text.join(" "))
            .with_timing(start, end)
            .with_confidence(0.7)
            .into_segment("parent".to_string(), Utc::now())
    }

    #[test]
    fn test_short_segment_passes_through() {
        let segment = make_segment(5, 0.0, 3.0);
        let chunks = split_long_segment(&segment, 12);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "parent");
        assert_eq!(chunks[0].text, segment.text);
    }

    #[test]
    fn test_fifty_words_over_twenty_seconds() {
        let segment = make_segment(50, 0.0, 20.0);
        let chunks = split_long_segment(&segment, 12);

        assert_eq!(chunks.len(), 5);

        let total_words: usize = chunks.iter().map(|c| c.word_count).sum();
        assert_eq!(total_words, 50);

        // audio_start values are non-decreasing and slices do not overlap
        for pair in chunks.windows(2) {
            let prev_end = pair[0].audio_end.unwrap();
            let next_start = pair[1].audio_start.unwrap();
            assert!(next_start >= pair[0].audio_start.unwrap());
            assert!((next_start - prev_end).abs() < 1e-9);
        }

        assert_eq!(chunks[0].audio_start, Some(0.0));
        assert_eq!(chunks[4].audio_end, Some(20.0));
    }

    #[test]
    fn test_chunk_ids_derive_from_parent() {
        let segment = make_segment(30, 0.0, 10.0);
        let chunks = split_long_segment(&segment, 12);

        assert_eq!(chunks[0].id, "parent-chunk-0");
        assert_eq!(chunks[1].id, "parent-chunk-1");
        assert_eq!(chunks[2].id, "parent-chunk-2");
    }

    #[test]
    fn test_chunks_inherit_source_and_confidence() {
        let segment = make_segment(30, 0.0, 10.0);
        let chunks = split_long_segment(&segment, 12);

        for chunk in &chunks {
            assert_eq!(chunk.source, SegmentSource::Local);
            assert!((chunk.confidence - 0.7).abs() < f32::EPSILON);
            assert!(!chunk.is_pending);
            assert_eq!(chunk.retry_count, 0);
        }
    }

    #[test]
    fn test_unknown_duration_yields_unbounded_chunks() {
        let text = (0..30).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let segment = SegmentInput::new(text).into_segment("p".to_string(), Utc::now());

        let chunks = split_long_segment(&segment, 12);
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.audio_start.is_none());
            assert!(chunk.audio_end.is_none());
        }
        // Creation sequence stays strictly increasing for ordering.
        assert!(chunks[0].created_at < chunks[1].created_at);
        assert!(chunks[1].created_at < chunks[2].created_at);
    }

    #[test]
    fn test_payload_is_not_carried_into_chunks() {
        let mut segment = make_segment(30, 0.0, 10.0);
        segment.audio_payload = Some(vec![1, 2, 3]);

        let chunks = split_long_segment(&segment, 12);
        assert!(chunks.iter().all(|c| c.audio_payload.is_none()));
    }

    #[test]
    fn test_exact_multiple_of_limit() {
        let segment = make_segment(24, 0.0, 12.0);
        let chunks = split_long_segment(&segment, 12);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].word_count, 12);
        assert_eq!(chunks[1].word_count, 12);
    }
}
