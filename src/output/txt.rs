//! Plain-text transcript writer. One timestamped line per merged segment,
//! grouped under a speaker header when speaker blocks are present —
//! the simplest of the three writers, and the one with the fewest
//! formatting opinions (spec section 4.8 leaves the plain-text shape
//! largely to the writer).

use std::path::Path;

use crate::error::Result;
use crate::model::MergedTimeline;

use super::atomic_write;

fn format_timestamp(total_sec: f64) -> String {
    let total = total_sec.max(0.0).round() as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

pub fn write(path: &Path, timeline: &MergedTimeline) -> Result<()> {
    let mut out = String::new();

    if let Some(blocks) = &timeline.speaker_blocks {
        for block in blocks {
            out.push_str(&format!(
                "[{} - {}] {}: {}\n\n",
                format_timestamp(block.start_sec),
                format_timestamp(block.end_sec),
                block.speaker,
                block.text
            ));
        }
    } else {
        for seg in &timeline.segments {
            out.push_str(&format!(
                "[{} - {}] {}\n",
                format_timestamp(seg.start_sec),
                format_timestamp(seg.end_sec),
                seg.text
            ));
        }
    }

    atomic_write(path, out.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Segment, SpeakerBlock, Totals};

    #[test]
    fn plain_segments_render_one_line_each() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.txt");
        let timeline = MergedTimeline {
            segments: vec![Segment {
                start_sec: 65.0,
                end_sec: 70.0,
                text: "hello".to_string(),
                confidence: None,
                words: None,
                speaker: None,
            }],
            full_text: "hello".to_string(),
            speaker_blocks: None,
            totals: Totals::default(),
        };
        write(&path, &timeline).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[01:05 - 01:10] hello"));
    }

    #[test]
    fn speaker_blocks_render_with_speaker_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.txt");
        let timeline = MergedTimeline {
            segments: vec![],
            full_text: "hi".to_string(),
            speaker_blocks: Some(vec![SpeakerBlock {
                speaker: "SPEAKER_1".to_string(),
                start_sec: 0.0,
                end_sec: 5.0,
                text: "hi".to_string(),
            }]),
            totals: Totals::default(),
        };
        write(&path, &timeline).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("SPEAKER_1: hi"));
    }
}
