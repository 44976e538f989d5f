//! Shared record types that flow across component boundaries.
//!
//! These are the explicit, statically-typed stand-ins for the heterogeneous
//! result dicts the pipeline otherwise tends to grow: every chunk result,
//! segment, speaker turn and manifest is one of these structs, never an
//! untyped map.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// A single word with its own timing, when the engine reports word-level
/// timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub start_sec: f64,
    pub end_sec: f64,
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f32>,
}

/// A timestamped text span produced by an engine. `start_sec`/`end_sec`
/// are always absolute (relative to the start of the source audio) once a
/// segment has left the engine boundary (see `engine` module doc).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        (self.end_sec - self.start_sec).max(0.0)
    }

    /// Shift a segment that was produced relative to a chunk's slice start
    /// into absolute source time. Used at the C3/C5 boundary per spec
    /// section 4.3: "Segment times returned by the engine are relative to
    /// the slice start; callers translate to absolute."
    pub fn shifted(mut self, chunk_start_sec: f64) -> Self {
        self.start_sec += chunk_start_sec;
        self.end_sec += chunk_start_sec;
        if let Some(words) = self.words.as_mut() {
            for w in words.iter_mut() {
                w.start_sec += chunk_start_sec;
                w.end_sec += chunk_start_sec;
            }
        }
        self
    }
}

/// Lifecycle state of a chunk as tracked by the Chunk Store / Scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChunkStatus::Pending => "Pending",
            ChunkStatus::Processing => "Processing",
            ChunkStatus::Completed => "Completed",
            ChunkStatus::Failed => "Failed",
            ChunkStatus::Skipped => "Skipped",
        };
        write!(f, "{s}")
    }
}

/// Durable per-chunk record as stored under `chunks/chunk_<index>.json`
/// (schema in spec section 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    pub index: usize,
    pub chunk_start_sec: f64,
    pub chunk_end_sec: f64,
    pub status: ChunkStatus,
    pub attempts: u32,
    pub engine_id: String,
    pub model_id: String,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error_kind: Option<ErrorKind>,
    pub segments: Vec<Segment>,
}

impl ChunkResult {
    pub fn pending(index: usize, chunk_start_sec: f64, chunk_end_sec: f64) -> Self {
        Self {
            index,
            chunk_start_sec,
            chunk_end_sec,
            status: ChunkStatus::Pending,
            attempts: 0,
            engine_id: String::new(),
            model_id: String::new(),
            started_at: None,
            finished_at: None,
            error_kind: None,
            segments: Vec::new(),
        }
    }

    pub fn span(&self) -> f64 {
        (self.chunk_end_sec - self.chunk_start_sec).max(0.0)
    }
}

/// A single time window assigned to one speaker (C6), disjoint and sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerTurn {
    pub speaker_id: String,
    pub start_sec: f64,
    pub end_sec: f64,
}

/// Consecutive same-speaker segments grouped by the merger (section 4.7
/// step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerBlock {
    pub speaker: String,
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
}

/// Totals reported alongside the merged timeline.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Totals {
    pub words: usize,
    pub chars: usize,
    pub duration_sec: f64,
}

/// The sealed output of the Merger (C7): append-only during construction,
/// read-only once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedTimeline {
    pub segments: Vec<Segment>,
    pub full_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_blocks: Option<Vec<SpeakerBlock>>,
    pub totals: Totals,
}

/// Final disposition of a run, surfaced as the process exit code (section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitStatus {
    Success,
    PartialSuccess,
    Failed,
    Canceled,
}

impl ExitStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failed => 1,
            ExitStatus::PartialSuccess => 2,
            ExitStatus::Canceled => 130,
        }
    }
}

/// Source audio identity, frozen once C1 has loaded the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub path: String,
    pub duration_sec: f64,
    pub sample_rate: u32,
}

/// Aggregate statistics surfaced in the manifest and console summary
/// (supplemented from the original batch-processing reports).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total_chunks: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_attempts: u32,
    pub wall_time_sec: f64,
}

/// `{ runId, source, plan, config snapshot, startedAt, finishedAt?,
/// exitStatus }` from spec section 3/6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub source: SourceInfo,
    pub plan_chunk_count: usize,
    pub config_snapshot: serde_json::Value,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub exit_status: Option<ExitStatus>,
    pub stats: RunStats,
    #[serde(default)]
    pub warnings: Vec<String>,
}
