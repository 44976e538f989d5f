//! C2: Chunk Planner.
//!
//! `plan()` computes a deterministic list of overlapping `(start, end,
//! index)` windows over a known total duration (spec section 4.2); it does
//! not touch the filesystem or any audio data, which is what lets it be
//! tested with plain floats.

use crate::error::{AutosubError, Result};

/// One planned time window. `start_sec`/`end_sec` are absolute offsets
/// into the source audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub start_sec: f64,
    pub end_sec: f64,
}

impl Chunk {
    pub fn duration(&self) -> f64 {
        (self.end_sec - self.start_sec).max(0.0)
    }
}

/// `plan(duration, chunkSec, overlapSec) -> []Chunk` per spec section 4.2.
///
/// Constraints: `0 < overlapSec < chunkSec <= duration`, except that when
/// `duration < chunkSec` a single chunk `[0, duration]` is produced instead
/// of enforcing the inequality against `duration`. The step between
/// consecutive starts is `chunkSec - overlapSec`; the last chunk is
/// truncated to `duration`, never synthesized past the end.
pub fn plan(duration: f64, chunk_sec: f64, overlap_sec: f64) -> Result<Vec<Chunk>> {
    if duration < 0.0 {
        return Err(AutosubError::Config("duration must be >= 0".to_string()));
    }
    if chunk_sec <= 0.0 {
        return Err(AutosubError::Config(
            "chunking.chunk_seconds must be > 0".to_string(),
        ));
    }
    if overlap_sec <= 0.0 || overlap_sec >= chunk_sec {
        return Err(AutosubError::Config(
            "chunking.overlap_seconds must be in (0, chunk_seconds)".to_string(),
        ));
    }

    if duration == 0.0 {
        return Ok(Vec::new());
    }

    if duration < chunk_sec {
        return Ok(vec![Chunk {
            index: 0,
            start_sec: 0.0,
            end_sec: duration,
        }]);
    }

    let step = chunk_sec - overlap_sec;
    let mut chunks = Vec::new();
    let mut k = 0usize;
    loop {
        let start = k as f64 * step;
        if start >= duration {
            break;
        }
        let end = (start + chunk_sec).min(duration);
        chunks.push(Chunk {
            index: k,
            start_sec: start,
            end_sec: end,
        });
        if end >= duration {
            break;
        }
        k += 1;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_when_shorter_than_chunk_duration() {
        let chunks = plan(12.0, 30.0, 5.0).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_sec, 0.0);
        assert_eq!(chunks[0].end_sec, 12.0);
    }

    #[test]
    fn zero_duration_produces_no_chunks() {
        let chunks = plan(0.0, 30.0, 5.0).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn overlap_stepping_matches_spec_formula() {
        // duration=55, chunk=30, overlap=5 => step=25
        // chunk0: [0,30) chunk1: start=25, end=min(55,55)=55
        let chunks = plan(55.0, 30.0, 5.0).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start_sec, 0.0);
        assert_eq!(chunks[0].end_sec, 30.0);
        assert_eq!(chunks[1].start_sec, 25.0);
        assert_eq!(chunks[1].end_sec, 55.0);
    }

    #[test]
    fn last_chunk_truncated_never_synthesized_past_end() {
        let chunks = plan(100.0, 30.0, 5.0).unwrap();
        let last = chunks.last().unwrap();
        assert!(last.end_sec <= 100.0);
        for c in &chunks {
            assert!(c.end_sec <= 100.0 + 1e-9);
        }
    }

    #[test]
    fn indices_are_contiguous_and_monotonic() {
        let chunks = plan(100.0, 30.0, 5.0).unwrap();
        for (i, w) in chunks.windows(2).enumerate() {
            assert_eq!(w[0].index, i);
            assert_eq!(w[1].index, i + 1);
            assert!(w[0].start_sec < w[1].start_sec);
        }
    }

    #[test]
    fn rejects_invalid_overlap() {
        assert!(plan(100.0, 30.0, 0.0).is_err());
        assert!(plan(100.0, 30.0, 30.0).is_err());
        assert!(plan(100.0, 30.0, 40.0).is_err());
    }

    #[test]
    fn universal_invariant_coverage_sum() {
        // sum(end-start) - (N-1)*overlap == duration within 1ms tolerance
        let duration = 97.0;
        let chunk_sec = 20.0;
        let overlap = 4.0;
        let chunks = plan(duration, chunk_sec, overlap).unwrap();
        let sum: f64 = chunks.iter().map(|c| c.duration()).sum();
        let n = chunks.len() as f64;
        let covered = sum - (n - 1.0) * overlap;
        assert!((covered - duration).abs() < 1e-3, "covered={covered}");
    }
}
