//! C11: Error Classifier & Recovery Policy.
//!
//! The classification itself lives on `ErrorKind` (see `error.rs`); this
//! module holds the policy that turns a classified failure plus run state
//! into a retry/skip/abort decision, and the backoff schedule used by the
//! scheduler (C5).

use std::time::Duration;

use rand::Rng;

use crate::config::SchedulerConfig;
use crate::error::ErrorKind;

/// What the scheduler should do next after a chunk attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Sleep then retry the same chunk.
    Retry,
    /// Give up on this chunk; mark it `Failed`/`Skipped` and move on.
    GiveUp,
    /// Stop the whole run immediately.
    AbortRun,
}

/// `backoff(n) = min(base * 2^(n-1), maxBackoff)`, jittered by +/-20%
/// (spec section 4.5). `attempt` is 1-based (the attempt that just failed).
pub fn backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exp = attempt.saturating_sub(1).min(30);
    let scaled = base.as_secs_f64() * 2f64.powi(exp as i32);
    let capped = scaled.min(max.as_secs_f64());
    let jitter_frac = rand::thread_rng().gen_range(-0.2..=0.2);
    let jittered = (capped * (1.0 + jitter_frac)).max(0.0);
    Duration::from_secs_f64(jittered)
}

/// Default backoff parameters from spec section 4.5.
pub const DEFAULT_BASE: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX: Duration = Duration::from_secs(30);

/// Decide what a single chunk's failure means for the scheduler, given its
/// attempt count so far (including the failed attempt) and the kind of
/// error classified for it.
pub fn decide_chunk(
    kind: ErrorKind,
    attempts_so_far: u32,
    unknown_retries_so_far: u32,
    cfg: &SchedulerConfig,
) -> Decision {
    match kind {
        ErrorKind::Cancellation => Decision::AbortRun,
        ErrorKind::Resource => Decision::AbortRun,
        ErrorKind::InputError => Decision::GiveUp,
        ErrorKind::EnginePermanent => Decision::GiveUp,
        ErrorKind::EngineTransient => {
            if attempts_so_far < cfg.max_attempts {
                Decision::Retry
            } else {
                Decision::GiveUp
            }
        }
        ErrorKind::Unknown => {
            if unknown_retries_so_far < cfg.unknown_max_retries && attempts_so_far < cfg.max_attempts
            {
                Decision::Retry
            } else {
                Decision::GiveUp
            }
        }
    }
}

/// Whether the run as a whole should abort given cumulative failures,
/// per spec section 4.5: "A run aborts if cumulative failed chunks exceed
/// failThresholdFraction * totalChunks".
pub fn run_should_abort_on_failures(
    failed_or_skipped: usize,
    total_chunks: usize,
    fail_threshold_fraction: f64,
) -> bool {
    if total_chunks == 0 {
        return false;
    }
    (failed_or_skipped as f64) > fail_threshold_fraction * (total_chunks as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(30);
        // with jitter disabled in expectation, check bounds instead of exact value
        for attempt in 1..=8 {
            let d = backoff(attempt, base, max);
            let unjittered = (base.as_secs_f64() * 2f64.powi((attempt - 1) as i32)).min(max.as_secs_f64());
            let lower = (unjittered * 0.8).max(0.0);
            let upper = unjittered * 1.2 + f64::EPSILON;
            assert!(
                d.as_secs_f64() >= lower - 0.001 && d.as_secs_f64() <= upper + 0.001,
                "attempt {attempt}: {:?} not within [{lower}, {upper}]",
                d
            );
        }
    }

    #[test]
    fn transient_retries_until_max_attempts() {
        let cfg = SchedulerConfig {
            max_attempts: 3,
            ..SchedulerConfig::default()
        };
        assert_eq!(
            decide_chunk(ErrorKind::EngineTransient, 1, 0, &cfg),
            Decision::Retry
        );
        assert_eq!(
            decide_chunk(ErrorKind::EngineTransient, 2, 0, &cfg),
            Decision::Retry
        );
        assert_eq!(
            decide_chunk(ErrorKind::EngineTransient, 3, 0, &cfg),
            Decision::GiveUp
        );
    }

    #[test]
    fn permanent_and_input_errors_never_retry() {
        let cfg = SchedulerConfig::default();
        assert_eq!(
            decide_chunk(ErrorKind::InputError, 1, 0, &cfg),
            Decision::GiveUp
        );
        assert_eq!(
            decide_chunk(ErrorKind::EnginePermanent, 1, 0, &cfg),
            Decision::GiveUp
        );
    }

    #[test]
    fn resource_and_cancellation_abort_run() {
        let cfg = SchedulerConfig::default();
        assert_eq!(
            decide_chunk(ErrorKind::Resource, 1, 0, &cfg),
            Decision::AbortRun
        );
        assert_eq!(
            decide_chunk(ErrorKind::Cancellation, 1, 0, &cfg),
            Decision::AbortRun
        );
    }

    #[test]
    fn unknown_retries_up_to_unknown_max_then_gives_up() {
        let cfg = SchedulerConfig {
            unknown_max_retries: 2,
            max_attempts: 10,
            ..SchedulerConfig::default()
        };
        assert_eq!(decide_chunk(ErrorKind::Unknown, 1, 0, &cfg), Decision::Retry);
        assert_eq!(decide_chunk(ErrorKind::Unknown, 2, 1, &cfg), Decision::Retry);
        assert_eq!(decide_chunk(ErrorKind::Unknown, 3, 2, &cfg), Decision::GiveUp);
    }

    #[test]
    fn fail_threshold_fraction_default_quarter() {
        assert!(!run_should_abort_on_failures(2, 10, 0.25));
        assert!(run_should_abort_on_failures(3, 10, 0.25));
    }
}
