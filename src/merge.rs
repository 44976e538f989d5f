//! C7: Merger/Deduplicator.
//!
//! Stitches completed chunks' segment streams into one deduplicated,
//! time-ordered `MergedTimeline` (spec section 4.7). Runs single-threaded,
//! strictly in index order, after the scheduler has drained (spec
//! section 5): "The Merger processes chunks strictly in index order."

use tracing::debug;

use crate::config::SpeakerConfig;
use crate::model::{ChunkResult, ChunkStatus, MergedTimeline, Segment, SpeakerBlock, Totals};

/// Default minimum shared word n-gram length for the textual dedup pass
/// (spec section 4.7 step 4).
pub const DEFAULT_NGRAM_DEDUP_MIN: usize = 4;

/// Run the full merge algorithm (spec section 4.7, steps 1-6).
///
/// `chunks` need not be sorted or filtered by the caller; this function
/// sorts by index and only considers `Completed` chunks. `Failed`/
/// `Skipped` chunks simply contribute no segments, leaving a gap (step 1).
pub fn merge(
    chunks: &[ChunkResult],
    duration_sec: f64,
    ngram_dedup_min: usize,
    speaker_cfg: &SpeakerConfig,
) -> MergedTimeline {
    let mut completed: Vec<&ChunkResult> = chunks
        .iter()
        .filter(|c| c.status == ChunkStatus::Completed)
        .collect();
    completed.sort_by_key(|c| c.index);

    let mut segments: Vec<Segment> = Vec::new();

    for (i, chunk) in completed.iter().enumerate() {
        let prev = if i > 0 { Some(completed[i - 1]) } else { None };
        let overlap = prev.and_then(|p| {
            if p.index + 1 == chunk.index && p.chunk_end_sec > chunk.chunk_start_sec {
                Some((chunk.chunk_start_sec, p.chunk_end_sec))
            } else {
                None
            }
        });

        match overlap {
            None => segments.extend(chunk.segments.iter().cloned()),
            Some((overlap_start, overlap_end)) => {
                let midpoint = (overlap_start + overlap_end) / 2.0;
                // Drop segments from the previous chunk that start at or
                // after the midpoint: the next chunk's version wins there.
                segments.retain(|s| s.start_sec < midpoint);

                for seg in &chunk.segments {
                    let mut seg = seg.clone();

                    // Segment from k+1 starting before this chunk's own
                    // window: clip to the window start if that keeps it
                    // non-degenerate, else drop (spec step 2, bullet 2).
                    if seg.start_sec < chunk.chunk_start_sec {
                        if seg.end_sec > chunk.chunk_start_sec {
                            seg.start_sec = chunk.chunk_start_sec;
                        } else {
                            continue;
                        }
                    }

                    if seg.start_sec >= midpoint {
                        segments.push(seg);
                        continue;
                    }

                    // Falls inside the pre-midpoint overlap: try to salvage
                    // it via n-gram dedup against the last kept segment
                    // (step 4, applied eagerly at the seam) rather than
                    // dropping outright, so text shared across the seam is
                    // never counted twice but non-shared trailing text
                    // survives (spec section 8 seed scenario 2).
                    if let Some(prev_seg) = segments.last_mut() {
                        match strip_shared_prefix(&prev_seg.text, &seg.text) {
                            Some(remainder) if !remainder.trim().is_empty() => {
                                seg.text = remainder;
                                seg.start_sec = prev_seg.end_sec.max(seg.start_sec);
                                seg.end_sec = seg.end_sec.max(seg.start_sec);
                                segments.push(seg);
                            }
                            Some(_) => {
                                // remainder empty: fully duplicated, drop.
                            }
                            None => {
                                // no shared n-gram found at all: still a
                                // same-region competing segment, chunk k
                                // already covers this span, drop it.
                            }
                        }
                    } else {
                        segments.push(seg);
                    }
                }
            }
        }
    }

    // Step 3: global invariants.
    segments.sort_by(|a, b| {
        a.start_sec
            .partial_cmp(&b.start_sec)
            .unwrap()
            .then_with(|| a.duration().partial_cmp(&b.duration()).unwrap())
    });
    segments.dedup_by(|a, b| a.start_sec == b.start_sec && a.end_sec == b.end_sec && a.text == b.text);
    for s in segments.iter_mut() {
        if s.end_sec > duration_sec {
            s.end_sec = duration_sec;
        }
    }
    segments.retain(|s| s.start_sec < s.end_sec || s.start_sec == s.end_sec);

    // Step 4: general textual dedup pass across remaining seams.
    dedup_adjacent_ngrams(&mut segments, ngram_dedup_min);

    // Step 5: full text.
    let full_text = collapse_whitespace(
        &segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" "),
    );

    let words = full_text.split_whitespace().count();
    let chars = full_text.chars().count();

    // Step 6: speaker blocks.
    let speaker_blocks = if speaker_cfg.enabled && segments.iter().any(|s| s.speaker.is_some()) {
        Some(build_speaker_blocks(&segments, speaker_cfg.turn_gap_sec))
    } else {
        None
    };

    debug!(segments = segments.len(), "merge complete");

    MergedTimeline {
        segments,
        full_text,
        speaker_blocks,
        totals: Totals {
            words,
            chars,
            duration_sec,
        },
    }
}

/// If the trailing words of `prev` share a run with the leading words of
/// `next` (any length >= 1, preferring the longest match), return `next`
/// with that shared run stripped from its front. Returns `None` if no
/// words are shared at all.
fn strip_shared_prefix(prev: &str, next: &str) -> Option<String> {
    let prev_words: Vec<&str> = prev.split_whitespace().collect();
    let next_words: Vec<&str> = next.split_whitespace().collect();
    let max_n = prev_words.len().min(next_words.len());

    for n in (1..=max_n).rev() {
        let prev_tail = &prev_words[prev_words.len() - n..];
        let next_head = &next_words[..n];
        if prev_tail
            .iter()
            .map(|w| w.to_lowercase())
            .eq(next_head.iter().map(|w| w.to_lowercase()))
        {
            return Some(next_words[n..].join(" "));
        }
    }
    None
}

/// Step 4 as a standalone pass: for sorted, already-deduplicated segments,
/// strip a shared leading n-gram (length >= `min_n`) from the later
/// segment of each adjacent pair.
fn dedup_adjacent_ngrams(segments: &mut Vec<Segment>, min_n: usize) {
    let mut i = 1;
    while i < segments.len() {
        let prev_text = segments[i - 1].text.clone();
        let next_text = segments[i].text.clone();
        let prev_words = prev_text.split_whitespace().count();
        let next_words = next_text.split_whitespace().count();
        let effective_min = min_n.min(prev_words.min(next_words));
        if effective_min == 0 {
            i += 1;
            continue;
        }
        if let Some(remainder) = strip_shared_prefix_min(&prev_text, &next_text, effective_min) {
            if remainder.trim().is_empty() {
                segments.remove(i);
                continue;
            }
            segments[i].text = remainder;
        }
        i += 1;
    }
}

fn strip_shared_prefix_min(prev: &str, next: &str, min_n: usize) -> Option<String> {
    let prev_words: Vec<&str> = prev.split_whitespace().collect();
    let next_words: Vec<&str> = next.split_whitespace().collect();
    let max_n = prev_words.len().min(next_words.len());
    if max_n < min_n {
        return None;
    }
    for n in (min_n..=max_n).rev() {
        let prev_tail = &prev_words[prev_words.len() - n..];
        let next_head = &next_words[..n];
        if prev_tail
            .iter()
            .map(|w| w.to_lowercase())
            .eq(next_head.iter().map(|w| w.to_lowercase()))
        {
            return Some(next_words[n..].join(" "));
        }
    }
    None
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Group consecutive same-speaker segments into blocks (spec section 4.7
/// step 6). A gap greater than `turn_gap_sec` or a speaker change starts
/// a new block.
pub fn build_speaker_blocks(segments: &[Segment], turn_gap_sec: f64) -> Vec<SpeakerBlock> {
    let mut blocks: Vec<SpeakerBlock> = Vec::new();

    for seg in segments {
        let speaker = seg.speaker.clone().unwrap_or_else(|| "SPEAKER_1".to_string());
        let start_new = match blocks.last() {
            None => true,
            Some(last) => last.speaker != speaker || (seg.start_sec - last.end_sec) > turn_gap_sec,
        };

        if start_new {
            blocks.push(SpeakerBlock {
                speaker,
                start_sec: seg.start_sec,
                end_sec: seg.end_sec,
                text: seg.text.clone(),
            });
        } else if let Some(last) = blocks.last_mut() {
            last.end_sec = seg.end_sec;
            last.text.push(' ');
            last.text.push_str(&seg.text);
        }
    }

    blocks
}
