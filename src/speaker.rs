//! C6: Speaker Attributor (optional).
//!
//! `attribute()` produces disjoint, sorted `SpeakerTurn`s covering
//! `[0, duration)`; `label()` assigns a segment to the turn with the
//! largest temporal overlap, ties broken by earlier-start turn (spec
//! section 4.6). The diarization provider is an external collaborator —
//! this module defines the boundary trait plus the single-speaker
//! fallback the spec mandates when no provider is configured.

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::model::{ChunkResult, SpeakerTurn};

/// Capability a diarization backend must provide. The core treats
/// providers as opaque, same as the `Transcriber` boundary in `engine`.
#[async_trait]
pub trait Diarizer: Send + Sync {
    async fn diarize(&self, path: &std::path::Path, duration_sec: f64) -> Result<Vec<SpeakerTurn>>;
}

/// Spec section 4.6: "If no provider is configured, emit a single
/// synthetic speaker 'SPEAKER_1'."
pub struct SingleSpeakerFallback;

#[async_trait]
impl Diarizer for SingleSpeakerFallback {
    async fn diarize(&self, _path: &std::path::Path, duration_sec: f64) -> Result<Vec<SpeakerTurn>> {
        Ok(vec![SpeakerTurn {
            speaker_id: "SPEAKER_1".to_string(),
            start_sec: 0.0,
            end_sec: duration_sec,
        }])
    }
}

/// Assign a speaker id to `(start_sec, end_sec)` by majority temporal
/// overlap with `turns`; ties broken by earlier-start turn (spec section
/// 4.6). Falls back to `"SPEAKER_1"` if `turns` is empty or none overlap.
pub fn label_span(turns: &[SpeakerTurn], start_sec: f64, end_sec: f64) -> String {
    let mut best: Option<(&SpeakerTurn, f64)> = None;
    for turn in turns {
        let overlap = (turn.end_sec.min(end_sec) - turn.start_sec.max(start_sec)).max(0.0);
        if overlap <= 0.0 {
            continue;
        }
        match &best {
            None => best = Some((turn, overlap)),
            Some((best_turn, best_overlap)) => {
                if overlap > *best_overlap
                    || (overlap == *best_overlap && turn.start_sec < best_turn.start_sec)
                {
                    best = Some((turn, overlap));
                }
            }
        }
    }
    best.map(|(t, _)| t.speaker_id.clone())
        .unwrap_or_else(|| "SPEAKER_1".to_string())
}

/// Enrich every segment of every completed chunk with a `speaker` label
/// (spec section 4.5/4.9: C6 runs as chunks complete, before C7 merges).
/// A straddling segment is labeled once by majority overlap across its
/// own span; the core never splits a segment at a turn boundary (that is
/// left to format writers, per spec section 4.6).
pub fn attribute(chunks: &mut [ChunkResult], turns: &[SpeakerTurn]) {
    for chunk in chunks.iter_mut() {
        for seg in chunk.segments.iter_mut() {
            seg.speaker = Some(label_span(turns, seg.start_sec, seg.end_sec));
        }
    }
}

/// Run diarization and enrich; degrades gracefully (spec section 4.6:
/// "Failure of the attributor... the run proceeds without speaker labels
/// and emits a warning"). Returns `Some(warning)` on degraded operation.
pub async fn attribute_run(
    diarizer: &dyn Diarizer,
    path: &std::path::Path,
    duration_sec: f64,
    chunks: &mut [ChunkResult],
) -> Option<String> {
    match diarizer.diarize(path, duration_sec).await {
        Ok(turns) => {
            attribute(chunks, &turns);
            None
        }
        Err(err) => {
            warn!(%err, "speaker attribution failed, proceeding without speaker labels");
            Some(format!("speaker attribution failed: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(id: &str, start: f64, end: f64) -> SpeakerTurn {
        SpeakerTurn {
            speaker_id: id.to_string(),
            start_sec: start,
            end_sec: end,
        }
    }

    #[test]
    fn majority_overlap_wins() {
        // spec section 8 seed scenario 6.
        let turns = vec![turn("A", 0.0, 20.0), turn("B", 20.0, 40.0), turn("A", 40.0, 60.0)];
        assert_eq!(label_span(&turns, 18.0, 21.0), "A");
        // (39, 42) overlaps B by 1.0s and the second "A" turn by 2.0s, so
        // the unique majority is "A" even though the span starts in B.
        assert_eq!(label_span(&turns, 39.0, 42.0), "A");
    }

    #[test]
    fn ties_broken_by_earlier_start() {
        let turns = vec![turn("early", 0.0, 10.0), turn("late", 10.0, 20.0)];
        // symmetric overlap around the boundary
        assert_eq!(label_span(&turns, 5.0, 15.0), "early");
    }

    #[test]
    fn no_overlap_falls_back_to_single_speaker() {
        let turns = vec![turn("A", 0.0, 5.0)];
        assert_eq!(label_span(&turns, 10.0, 12.0), "SPEAKER_1");
    }

    #[tokio::test]
    async fn fallback_covers_whole_duration() {
        let fallback = SingleSpeakerFallback;
        let turns = fallback
            .diarize(std::path::Path::new("/tmp/x.wav"), 42.0)
            .await
            .unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].speaker_id, "SPEAKER_1");
        assert_eq!(turns[0].end_sec, 42.0);
    }
}
