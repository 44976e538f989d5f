//! C10: Progress & Telemetry.
//!
//! In-process counters the scheduler (C5) and merger (C7) update as work
//! completes, plus a periodic logger. No UI policy lives here — the CLI
//! layer decides whether to render an `indicatif` bar on top of this.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

/// Point-in-time view of the run's progress. Cheap to copy; produced by
/// `ProgressSink::snapshot`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Lock-free counters shared between the scheduler and anything observing
/// run progress (CLI progress bar, `status` subcommand, periodic logger).
/// Each field is an independent atomic; `snapshot()` reads them in a fixed
/// order. Counters never derive from one another without going through a
/// snapshot, per spec section 4.10.
#[derive(Debug)]
pub struct ProgressSink {
    total: AtomicUsize,
    pending: AtomicUsize,
    running: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl ProgressSink {
    pub fn new(total: usize) -> Self {
        Self {
            total: AtomicUsize::new(total),
            pending: AtomicUsize::new(total),
            running: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        }
    }

    /// Adjust `pending`/`completed` up front for chunks a resume scan
    /// already found `Completed` on disk, so `total` still reflects the
    /// whole plan but the work actually scheduled is smaller.
    pub fn preload_completed(&self, already_completed: usize) {
        self.pending.fetch_sub(already_completed, Ordering::SeqCst);
        self.completed.fetch_add(already_completed, Ordering::SeqCst);
    }

    pub fn on_started(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        self.running.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_completed(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_failed(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_skipped(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    /// A consistent point-in-time view, per spec section 4.10: "a
    /// snapshot-read operation that is lock-free... a consistent
    /// point-in-time view." Each field is read independently; counts can
    /// race with concurrent updates by at most one in-flight transition,
    /// which is acceptable for a progress display.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::SeqCst),
            pending: self.pending.load(Ordering::SeqCst),
            running: self.running.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
        }
    }
}

/// Spawn a background task that logs the snapshot every `interval` while
/// any workers are active (running > 0 or pending > 0), per spec section
/// 4.10's default 30s cadence. Returns a handle the coordinator aborts
/// once the scheduler has drained.
pub fn spawn_periodic_logger(
    sink: Arc<ProgressSink>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            let s = sink.snapshot();
            if s.running == 0 && s.pending == 0 {
                break;
            }
            info!(
                total = s.total,
                pending = s.pending,
                running = s.running,
                completed = s.completed,
                failed = s.failed,
                skipped = s.skipped,
                "run progress"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_move_through_lifecycle() {
        let sink = ProgressSink::new(3);
        assert_eq!(sink.snapshot().pending, 3);

        sink.on_started();
        let s = sink.snapshot();
        assert_eq!(s.pending, 2);
        assert_eq!(s.running, 1);

        sink.on_completed();
        let s = sink.snapshot();
        assert_eq!(s.running, 0);
        assert_eq!(s.completed, 1);
    }

    #[test]
    fn preload_completed_accounts_for_resumed_chunks() {
        let sink = ProgressSink::new(5);
        sink.preload_completed(2);
        let s = sink.snapshot();
        assert_eq!(s.total, 5);
        assert_eq!(s.pending, 3);
        assert_eq!(s.completed, 2);
    }

    #[test]
    fn failed_and_skipped_drain_running() {
        let sink = ProgressSink::new(2);
        sink.on_started();
        sink.on_failed();
        sink.on_started();
        sink.on_skipped();
        let s = sink.snapshot();
        assert_eq!(s.running, 0);
        assert_eq!(s.failed, 1);
        assert_eq!(s.skipped, 1);
    }
}
