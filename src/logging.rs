//! C10 ambient concern: a single global `tracing` subscriber plus a
//! per-run log file. `init()` installs the stderr layer once, at process
//! startup; `attach_run_log()` points a second, always-on layer at
//! `logs/run.log` once a run directory exists, so every run's lines land
//! in its own directory without a second global subscriber (`tracing`
//! only allows one).

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Write as _};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

static RUN_LOG_FILE: OnceLock<Arc<Mutex<Option<File>>>> = OnceLock::new();

/// Install the global subscriber: compact stderr output at the requested
/// verbosity, plus a file layer that is a no-op until `attach_run_log` is
/// called (it writes every level, independent of `-v`).
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };

    let file = Arc::new(Mutex::new(None));
    RUN_LOG_FILE.set(Arc::clone(&file)).ok();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .compact()
        .with_filter(tracing_subscriber::filter::LevelFilter::from_level(level));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(RunFileLayer { file })
        .init();
}

/// Point the file layer at `path`, truncating any previous contents.
/// Safe to call more than once (e.g. on resume); the most recent call
/// wins. A failure to open the file degrades to stderr-only logging
/// rather than aborting the run.
pub fn attach_run_log(path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    if let Some(slot) = RUN_LOG_FILE.get() {
        *slot.lock().unwrap() = Some(file);
    }
    Ok(())
}

struct RunFileLayer {
    file: Arc<Mutex<Option<File>>>,
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    extra: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.extra, " {}={value:?}", field.name());
        }
    }
}

impl<S: Subscriber> Layer<S> for RunFileLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut guard = self.file.lock().unwrap();
        let Some(file) = guard.as_mut() else {
            return;
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let meta = event.metadata();
        let _ = writeln!(
            file,
            "{} {} {}{}",
            meta.level(),
            meta.target(),
            visitor.message,
            visitor.extra
        );
    }
}
