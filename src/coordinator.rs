//! C9: Run Coordinator.
//!
//! The top-level façade: validates the input, sets up the run directory,
//! drives C1 (load) -> C2 (plan) -> C5 (schedule) -> C6 (attribute,
//! optional) -> C7 (merge) -> C8 (assemble), and writes the final
//! manifest (spec section 4.9). Staged logging and progress reporting
//! follow the same "numbered stage" shape as the teacher's pipeline, now
//! generalized from a single straight-through run into a resumable,
//! crash-safe one backed by a real run directory instead of a scratch
//! `TempDir`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::audio::{self, AudioSource};
use crate::config::Config;
use crate::engine;
use crate::error::{AutosubError, ErrorKind, Result};
use crate::merge::{self, DEFAULT_NGRAM_DEDUP_MIN};
use crate::model::{ChunkResult, ChunkStatus, ExitStatus, MergedTimeline, RunManifest, RunStats, SourceInfo};
use crate::output;
use crate::progress::{self, ProgressSink};
use crate::scheduler::Scheduler;
use crate::speaker::{self, SingleSpeakerFallback};
use crate::store::ChunkStore;

/// What a completed (or canceled/failed) run leaves behind.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub manifest: RunManifest,
}

/// Generate a run id: `UTC(YYYYMMDD_HHMMSS) + "_" + 4 hex bytes` (spec
/// section 11.2), so two runs started within the same second never
/// collide.
fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let suffix: u16 = rand::random();
    format!("{timestamp}_{suffix:04x}")
}

/// Create the run directory's subdirectories eagerly and idempotently, so
/// a resumed run never fails on a missing directory (spec section 11.2).
fn bootstrap_run_dir(run_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(run_dir.join("chunks"))?;
    std::fs::create_dir_all(run_dir.join("output"))?;
    std::fs::create_dir_all(run_dir.join("logs"))?;
    if let Err(e) = crate::logging::attach_run_log(&run_dir.join("logs/run.log")) {
        warn!(%e, "failed to open per-run log file, continuing with stderr only");
    }
    Ok(())
}

fn manifest_path(run_dir: &Path) -> PathBuf {
    run_dir.join("manifest.json")
}

fn write_manifest(run_dir: &Path, manifest: &RunManifest) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(manifest)?;
    let tmp = run_dir.join(".manifest.json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, manifest_path(run_dir))?;
    Ok(())
}

fn read_manifest(run_dir: &Path) -> Result<RunManifest> {
    let contents = std::fs::read_to_string(manifest_path(run_dir))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Start a fresh run, or fall back to `run_dir_override` for `resume`.
pub async fn run(
    config: &Config,
    input_path: &Path,
    run_dir_override: Option<PathBuf>,
    cancel: Arc<AtomicBool>,
) -> Result<RunReport> {
    if !input_path.exists() {
        return Err(AutosubError::FileNotFound(input_path.display().to_string()));
    }

    let (run_id, run_dir, resuming) = match run_dir_override {
        Some(dir) if dir.exists() && manifest_path(&dir).exists() => {
            let existing = read_manifest(&dir)?;
            (existing.run_id, dir, true)
        }
        Some(dir) => {
            let run_id = generate_run_id();
            (run_id, dir, false)
        }
        None => {
            let run_id = generate_run_id();
            let dir = config.output.run_dir_root.join(&run_id);
            (run_id, dir, false)
        }
    };

    bootstrap_run_dir(&run_dir)?;
    info!(run_id = %run_id, run_dir = %run_dir.display(), resuming, "starting run");

    // C1: load and decode once.
    info!("stage 1/5: loading audio");
    let source = Arc::new(AudioSource::load(input_path, 16_000).await?);

    let mut warnings = Vec::new();

    // C2: plan. On resume the plan is recomputed identically from the
    // same config + duration, so chunk indices line up with existing
    // files on disk.
    info!("stage 2/5: planning chunks");
    let chunk_plan = audio::plan(
        source.duration_sec,
        config.chunking.chunk_seconds,
        config.chunking.overlap_seconds,
    )?;

    let source_info = SourceInfo {
        path: input_path.display().to_string(),
        duration_sec: source.duration_sec,
        sample_rate: source.sample_rate,
    };

    let started_at = if resuming {
        read_manifest(&run_dir)?.started_at
    } else {
        Utc::now()
    };

    let mut manifest = RunManifest {
        run_id: run_id.clone(),
        source: source_info,
        plan_chunk_count: chunk_plan.len(),
        config_snapshot: serde_json::to_value(config).unwrap_or(serde_json::Value::Null),
        started_at,
        finished_at: None,
        exit_status: None,
        stats: RunStats::default(),
        warnings: Vec::new(),
    };
    write_manifest(&run_dir, &manifest)?;

    // C4: chunk store + resume scan.
    info!("stage 3/5: scanning chunk store");
    let store = ChunkStore::new(&run_dir)?;
    let existing = store.resume_scan()?;
    let mut by_index: std::collections::HashMap<usize, ChunkResult> =
        existing.into_iter().map(|c| (c.index, c)).collect();

    for chunk in &chunk_plan {
        by_index
            .entry(chunk.index)
            .or_insert_with(|| ChunkResult::pending(chunk.index, chunk.start_sec, chunk.end_sec));
    }

    let already_completed = by_index
        .values()
        .filter(|c| c.status == ChunkStatus::Completed)
        .count();
    let work: Vec<ChunkResult> = by_index
        .values()
        .filter(|c| c.status == ChunkStatus::Pending)
        .cloned()
        .collect();

    let progress = Arc::new(ProgressSink::new(chunk_plan.len()));
    progress.preload_completed(already_completed);
    let logger = progress::spawn_periodic_logger(Arc::clone(&progress), std::time::Duration::from_secs(30));

    // C3 + C5: engine selection and scheduling.
    info!("stage 4/5: transcribing {} pending chunk(s)", work.len());
    let engine: Arc<dyn engine::Transcriber> = Arc::from(engine::create_engine(config)?);
    let scheduler = Scheduler::new(engine, store.clone(), config, Arc::clone(&progress), Arc::clone(&cancel));
    let outcome = scheduler.run(Arc::clone(&source), work).await;
    logger.abort();

    let mut all_chunks: Vec<ChunkResult> = store
        .list()?
        .into_iter()
        .filter_map(|i| store.read(i).ok())
        .collect();

    // C6: speaker attribution, optional and best-effort.
    if config.speaker.enabled && !outcome.aborted {
        info!("stage 5/5: attributing speakers");
        let fallback = SingleSpeakerFallback;
        if let Some(warning) =
            speaker::attribute_run(&fallback, input_path, source.duration_sec, &mut all_chunks).await
        {
            warnings.push(warning);
        }
        for chunk in &all_chunks {
            if chunk.status == ChunkStatus::Completed {
                let _ = store.write(chunk);
            }
        }
    }

    let exit_status = if let Some(reason) = &outcome.abort_reason {
        if reason.kind() == ErrorKind::Cancellation {
            ExitStatus::Canceled
        } else {
            ExitStatus::Failed
        }
    } else if outcome.stats.failed > 0 {
        ExitStatus::PartialSuccess
    } else {
        ExitStatus::Success
    };

    let timeline: Option<MergedTimeline> = if exit_status != ExitStatus::Failed
        && exit_status != ExitStatus::Canceled
    {
        Some(merge::merge(
            &all_chunks,
            source.duration_sec,
            DEFAULT_NGRAM_DEDUP_MIN,
            &config.speaker,
        ))
    } else {
        None
    };

    if let Some(timeline) = &timeline {
        output::assemble(
            &run_dir,
            &manifest,
            timeline,
            &config.output.formats,
            &config.transcription.language,
        )?;
    }

    if !config.output.retain_chunks && exit_status == ExitStatus::Success {
        let _ = std::fs::remove_dir_all(run_dir.join("chunks"));
    }

    manifest.finished_at = Some(Utc::now());
    manifest.exit_status = Some(exit_status);
    manifest.stats = outcome.stats;
    manifest.warnings = warnings;
    write_manifest(&run_dir, &manifest)?;

    if let Some(reason) = &outcome.abort_reason {
        warn!(run_id = %run_id, %reason, "run ended without success");
    }
    info!(run_id = %run_id, exit_status = ?exit_status, "run finished");

    Ok(RunReport {
        run_id,
        run_dir,
        manifest,
    })
}

/// `status <run-dir>`: read the manifest plus a fresh chunk-store scan
/// without mutating anything, for an already-finished or in-flight run.
pub fn status(run_dir: &Path) -> Result<RunManifest> {
    read_manifest(run_dir)
}

pub fn cancellation_requested(cancel: &Arc<AtomicBool>) -> bool {
    cancel.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_has_expected_shape() {
        let id = generate_run_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 4);
    }

    #[test]
    fn bootstrap_creates_expected_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("run1");
        bootstrap_run_dir(&run_dir).unwrap();
        assert!(run_dir.join("chunks").is_dir());
        assert!(run_dir.join("output").is_dir());
        assert!(run_dir.join("logs").is_dir());

        // idempotent: calling again on an existing dir does not fail.
        bootstrap_run_dir(&run_dir).unwrap();
    }

    #[test]
    fn manifest_roundtrips_through_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = RunManifest {
            run_id: "test".to_string(),
            source: SourceInfo {
                path: "in.wav".to_string(),
                duration_sec: 1.0,
                sample_rate: 16000,
            },
            plan_chunk_count: 1,
            config_snapshot: serde_json::json!({}),
            started_at: Utc::now(),
            finished_at: None,
            exit_status: None,
            stats: RunStats::default(),
            warnings: vec![],
        };
        write_manifest(dir.path(), &manifest).unwrap();
        let read_back = read_manifest(dir.path()).unwrap();
        assert_eq!(read_back.run_id, "test");
    }
}
