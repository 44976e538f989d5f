//! Final merged JSON writer (spec section 6 "Final merged JSON" schema).

use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::model::{MergedTimeline, RunManifest, Segment, SpeakerBlock, Totals};

use super::atomic_write;

#[derive(Serialize)]
struct FinalTranscript<'a> {
    run_id: &'a str,
    source: SourceJson<'a>,
    config_snapshot: &'a serde_json::Value,
    segments: &'a [Segment],
    #[serde(skip_serializing_if = "Option::is_none")]
    speaker_blocks: Option<&'a Vec<SpeakerBlock>>,
    full_text: &'a str,
    totals: &'a Totals,
}

#[derive(Serialize)]
struct SourceJson<'a> {
    path: &'a str,
    duration_sec: f64,
}

pub fn write(path: &Path, manifest: &RunManifest, timeline: &MergedTimeline) -> Result<()> {
    let doc = FinalTranscript {
        run_id: &manifest.run_id,
        source: SourceJson {
            path: &manifest.source.path,
            duration_sec: manifest.source.duration_sec,
        },
        config_snapshot: &manifest.config_snapshot,
        segments: &timeline.segments,
        speaker_blocks: timeline.speaker_blocks.as_ref(),
        full_text: &timeline.full_text,
        totals: &timeline.totals,
    };
    let bytes = serde_json::to_vec_pretty(&doc)?;
    atomic_write(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceInfo;

    #[test]
    fn writes_schema_shaped_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        let manifest = RunManifest {
            run_id: "run1".to_string(),
            source: SourceInfo {
                path: "in.wav".to_string(),
                duration_sec: 12.0,
                sample_rate: 16000,
            },
            plan_chunk_count: 1,
            config_snapshot: serde_json::json!({"chunking": {"chunk_seconds": 30}}),
            started_at: chrono::Utc::now(),
            finished_at: None,
            exit_status: None,
            stats: Default::default(),
            warnings: vec![],
        };
        let timeline = MergedTimeline {
            segments: vec![Segment {
                start_sec: 0.0,
                end_sec: 1.0,
                text: "hi".to_string(),
                confidence: None,
                words: None,
                speaker: None,
            }],
            full_text: "hi".to_string(),
            speaker_blocks: None,
            totals: Totals {
                words: 1,
                chars: 2,
                duration_sec: 12.0,
            },
        };

        write(&path, &manifest, &timeline).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["run_id"], "run1");
        assert_eq!(value["source"]["duration_sec"], 12.0);
        assert_eq!(value["full_text"], "hi");
        assert_eq!(value["segments"][0]["text"], "hi");
        assert!(value.get("speaker_blocks").is_none());
    }
}
