//! A chunked transcription pipeline orchestrator: splits long-form audio
//! into overlapping windows, schedules them through a pluggable
//! speech-recognition engine with retry and partial-failure tolerance,
//! persists per-chunk results durably for crash-safe resume, merges the
//! overlapping results into a deduplicated timeline, and emits
//! JSON/TXT/DOCX output.
//!
//! Module map mirrors the component split: `audio` (C1/C2), `engine`
//! (C3), `store` (C4), `scheduler` (C5), `speaker` (C6), `merge` (C7),
//! `output` (C8), `coordinator` (C9), `progress` (C10), `recovery`/
//! `error` (C11).

pub mod audio;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod logging;
pub mod merge;
pub mod model;
pub mod output;
pub mod progress;
pub mod recovery;
pub mod scheduler;
pub mod speaker;
pub mod store;

pub use config::Config;
pub use coordinator::{run, status, RunReport};
pub use error::{AutosubError, Result};
