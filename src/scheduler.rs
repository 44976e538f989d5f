//! C5: Chunk Scheduler.
//!
//! A bounded worker pool that drains the chunk plan through an `Engine`
//! (C3), persisting every transition through the `ChunkStore` (C4) and
//! consulting the recovery policy (C11) on failure. Chunks start in index
//! order but may complete out of order; the caller (Run Coordinator, C9)
//! is responsible for re-ordering before merge.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::audio::AudioSource;
use crate::config::{Config, SchedulerConfig};
use crate::engine::{EngineOptions, Transcriber};
use crate::error::{AutosubError, ErrorKind, Result};
use crate::model::{ChunkResult, ChunkStatus, RunStats};
use crate::progress::ProgressSink;
use crate::recovery::{self, Decision};
use crate::store::ChunkStore;

pub struct Scheduler {
    engine: Arc<dyn Transcriber>,
    store: ChunkStore,
    config: SchedulerConfig,
    language: String,
    options: EngineOptions,
    progress: Arc<ProgressSink>,
    cancel: Arc<AtomicBool>,
}

/// Returned by `run()`: whether the run should continue to merge, and
/// whether it must abort outright (resource exhaustion, cancellation, or
/// the failure threshold).
pub struct SchedulerOutcome {
    pub aborted: bool,
    pub abort_reason: Option<AutosubError>,
    pub stats: RunStats,
}

impl Scheduler {
    pub fn new(
        engine: Arc<dyn Transcriber>,
        store: ChunkStore,
        config: &Config,
        progress: Arc<ProgressSink>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            engine,
            store,
            config: config.scheduler,
            language: config.transcription.language.clone(),
            options: EngineOptions::default(),
            progress,
            cancel,
        }
    }

    /// Execute the given work set (chunks still `Pending` after resume
    /// scan) against `source`. Chunks not in `work` (already `Completed`)
    /// are assumed already counted into `progress`.
    pub async fn run(&self, source: Arc<AudioSource>, work: Vec<ChunkResult>) -> SchedulerOutcome {
        let started = Instant::now();
        let total_chunks = self.progress.snapshot().total;
        let failed_or_skipped = Arc::new(AtomicUsize::new(0));
        let completed_count = Arc::new(AtomicUsize::new(0));
        let total_attempts = Arc::new(AtomicUsize::new(0));
        let abort = Arc::new(std::sync::Mutex::new(None::<AutosubError>));

        let max_workers = self.config.max_workers.max(1);

        stream::iter(work.into_iter())
            .for_each_concurrent(max_workers, |chunk| {
                let source = Arc::clone(&source);
                let failed_or_skipped = Arc::clone(&failed_or_skipped);
                let completed_count = Arc::clone(&completed_count);
                let total_attempts = Arc::clone(&total_attempts);
                let abort = Arc::clone(&abort);

                async move {
                    if self.cancel.load(Ordering::SeqCst) {
                        return;
                    }
                    if abort.lock().unwrap().is_some() {
                        return;
                    }

                    let outcome = self.process_one(&source, chunk).await;
                    total_attempts.fetch_add(outcome.attempts as usize, Ordering::SeqCst);

                    match outcome.status {
                        ChunkStatus::Completed => {
                            completed_count.fetch_add(1, Ordering::SeqCst);
                            self.progress.on_completed();
                        }
                        ChunkStatus::Failed | ChunkStatus::Skipped => {
                            let n = failed_or_skipped.fetch_add(1, Ordering::SeqCst) + 1;
                            self.progress.on_failed();
                            if let Some(kind) = outcome.error_kind {
                                if matches!(kind, ErrorKind::Resource | ErrorKind::Cancellation) {
                                    *abort.lock().unwrap() = Some(AutosubError::classified(
                                        kind,
                                        "scheduler aborting run",
                                    ));
                                    self.cancel.store(true, Ordering::SeqCst);
                                }
                            }
                            if recovery::run_should_abort_on_failures(
                                n,
                                total_chunks,
                                self.config.fail_threshold_fraction,
                            ) {
                                *abort.lock().unwrap() = Some(AutosubError::classified(
                                    ErrorKind::EnginePermanent,
                                    format!(
                                        "failed chunks ({n}) exceeded fail_threshold_fraction ({})",
                                        self.config.fail_threshold_fraction
                                    ),
                                ));
                                self.cancel.store(true, Ordering::SeqCst);
                            }
                        }
                        _ => {}
                    }
                }
            })
            .await;

        let stats = RunStats {
            total_chunks,
            completed: completed_count.load(Ordering::SeqCst),
            failed: failed_or_skipped.load(Ordering::SeqCst),
            skipped: 0,
            total_attempts: total_attempts.load(Ordering::SeqCst) as u32,
            wall_time_sec: started.elapsed().as_secs_f64(),
        };

        let canceled_by_signal = self.cancel.load(Ordering::SeqCst) && abort.lock().unwrap().is_none();
        let abort_reason = if canceled_by_signal {
            Some(AutosubError::Canceled)
        } else {
            abort.lock().unwrap().take()
        };

        SchedulerOutcome {
            aborted: abort_reason.is_some(),
            abort_reason,
            stats,
        }
    }

    /// Per-chunk algorithm (spec section 4.5 steps 1-5), including retry
    /// with backoff and a `chunkTimeoutSec` soft timeout.
    async fn process_one(&self, source: &AudioSource, mut result: ChunkResult) -> ChunkResult {
        let mut unknown_retries = 0u32;

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                // Leave the chunk Processing/Pending for a future resume;
                // do not mark Failed on a user-initiated cancel.
                return result;
            }

            if result.attempts == 0 {
                self.progress.on_started();
            }
            result.status = ChunkStatus::Processing;
            result.attempts += 1;
            result.started_at = Some(Utc::now());
            result.engine_id = self.engine.engine_id().to_string();
            result.model_id = self.engine.model_id();
            let _ = self.store.write(&result);

            let pcm = source.slice(result.chunk_start_sec, result.chunk_end_sec);
            let call = self.engine.transcribe(&pcm, &self.language, &self.options);
            let timeout = std::time::Duration::from_secs(self.config.chunk_timeout_sec);

            let outcome = tokio::time::timeout(timeout, call).await;

            match outcome {
                Ok(Ok(output)) => {
                    result.segments = output
                        .segments
                        .into_iter()
                        .map(|s| s.shifted(result.chunk_start_sec))
                        .collect();
                    result.status = ChunkStatus::Completed;
                    result.error_kind = None;
                    result.finished_at = Some(Utc::now());
                    let _ = self.store.write(&result);
                    return result;
                }
                Ok(Err(err)) => {
                    let kind = err.kind();
                    if kind == ErrorKind::Unknown {
                        unknown_retries += 1;
                    }
                    warn!(chunk = result.index, attempt = result.attempts, %err, "chunk attempt failed");
                    let decision = recovery::decide_chunk(
                        kind,
                        result.attempts,
                        unknown_retries,
                        &self.config,
                    );
                    if !self.finish_or_retry(&mut result, kind, decision).await {
                        return result;
                    }
                }
                Err(_elapsed) => {
                    warn!(chunk = result.index, "chunk timed out");
                    let decision = recovery::decide_chunk(
                        ErrorKind::EngineTransient,
                        result.attempts,
                        unknown_retries,
                        &self.config,
                    );
                    if !self
                        .finish_or_retry(&mut result, ErrorKind::EngineTransient, decision)
                        .await
                    {
                        return result;
                    }
                }
            }
        }
    }

    /// Apply a recovery `Decision`; returns `true` if the caller should
    /// loop again (i.e. retry), `false` if `result` is now terminal.
    async fn finish_or_retry(
        &self,
        result: &mut ChunkResult,
        kind: ErrorKind,
        decision: Decision,
    ) -> bool {
        match decision {
            Decision::Retry => {
                let delay = recovery::backoff(
                    result.attempts,
                    recovery::DEFAULT_BASE,
                    recovery::DEFAULT_MAX,
                );
                result.status = ChunkStatus::Pending;
                result.error_kind = Some(kind);
                let _ = self.store.write(result);
                tokio::time::sleep(delay).await;
                true
            }
            Decision::GiveUp => {
                result.status = ChunkStatus::Failed;
                result.error_kind = Some(kind);
                result.finished_at = Some(Utc::now());
                let _ = self.store.write(result);
                info!(chunk = result.index, kind = %kind, "chunk given up after {} attempts", result.attempts);
                false
            }
            Decision::AbortRun => {
                result.status = ChunkStatus::Failed;
                result.error_kind = Some(kind);
                result.finished_at = Some(Utc::now());
                let _ = self.store.write(result);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PcmSlice;
    use crate::engine::EngineOutput;
    use crate::model::Segment;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    struct MockEngine {
        fail_times: AtomicU32,
        kind: ErrorKind,
    }

    #[async_trait]
    impl Transcriber for MockEngine {
        async fn transcribe(
            &self,
            pcm: &PcmSlice,
            _language: &str,
            _options: &EngineOptions,
        ) -> Result<EngineOutput> {
            let remaining = self.fail_times.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(AutosubError::classified(self.kind, "mock failure"));
            }
            Ok(EngineOutput {
                segments: vec![Segment {
                    start_sec: 0.0,
                    end_sec: pcm.duration_sec(),
                    text: "ok".to_string(),
                    confidence: None,
                    words: None,
                    speaker: None,
                }],
                text: "ok".to_string(),
                language_detected: None,
                diagnostics: None,
            })
        }

        fn engine_id(&self) -> &'static str {
            "mock"
        }

        fn model_id(&self) -> String {
            "mock-model".to_string()
        }
    }

    fn fake_source() -> Arc<AudioSource> {
        Arc::new(AudioSource::for_test(vec![0i16; 16000 * 5], 16000))
    }

    #[tokio::test]
    async fn transient_failure_retries_then_completes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path()).unwrap();
        let config = Config::default();
        let progress = Arc::new(ProgressSink::new(1));
        let cancel = Arc::new(AtomicBool::new(false));
        let engine: Arc<dyn Transcriber> = Arc::new(MockEngine {
            fail_times: AtomicU32::new(2),
            kind: ErrorKind::EngineTransient,
        });
        let scheduler = Scheduler::new(engine, store.clone(), &config, progress, cancel);

        let source = fake_source();
        let chunk = ChunkResult::pending(0, 0.0, source.duration_sec);
        let result = scheduler.process_one(&source, chunk).await;

        assert_eq!(result.status, ChunkStatus::Completed);
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn input_error_never_retries() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path()).unwrap();
        let config = Config::default();
        let progress = Arc::new(ProgressSink::new(1));
        let cancel = Arc::new(AtomicBool::new(false));
        let engine: Arc<dyn Transcriber> = Arc::new(MockEngine {
            fail_times: AtomicU32::new(99),
            kind: ErrorKind::InputError,
        });
        let scheduler = Scheduler::new(engine, store, &config, progress, cancel);

        let source = fake_source();
        let chunk = ChunkResult::pending(0, 0.0, source.duration_sec);
        let result = scheduler.process_one(&source, chunk).await;

        assert_eq!(result.status, ChunkStatus::Failed);
        assert_eq!(result.attempts, 1);
    }
}
