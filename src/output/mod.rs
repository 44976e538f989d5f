//! C8: Output Assembler.
//!
//! Drives format writers (JSON/TXT/DOCX) from the already-sealed
//! `MergedTimeline` (spec section 4.8). Every writer receives the same
//! timeline; the assembler only decides which writers to run and where
//! their files land under `output/` (spec section 6 run directory
//! layout). Writers are pluggable in spirit — each is a free function
//! behind `OutputFormat`, the same shape the teacher's subtitle
//! formatters use (one `SubtitleFormatter` per format), generalized here
//! to formats that need more than a single string (DOCX).

pub mod docx;
pub mod json;
pub mod txt;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::model::{MergedTimeline, RunManifest};

/// Write every format in `formats` into `run_dir/output/`, each via
/// temp-file + rename (spec section 4.9: "All externally visible files
/// are produced by temp-file + rename").
pub fn assemble(
    run_dir: &Path,
    manifest: &RunManifest,
    timeline: &MergedTimeline,
    formats: &[OutputFormat],
    language: &str,
) -> Result<Vec<PathBuf>> {
    let output_dir = run_dir.join("output");
    std::fs::create_dir_all(&output_dir)?;

    let mut written = Vec::new();
    for format in formats {
        let path = output_dir.join(format!("transcript.{}", format.extension()));
        match format {
            OutputFormat::Json => json::write(&path, manifest, timeline)?,
            OutputFormat::Txt => txt::write(&path, timeline)?,
            OutputFormat::Docx => docx::write(&path, manifest, timeline, language)?,
        }
        info!(path = %path.display(), format = %format, "wrote output");
        written.push(path);
    }
    Ok(written)
}

pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("out")
    ));
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
