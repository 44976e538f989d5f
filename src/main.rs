use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use autosub::config::{Config, Provider, SpeakerConfig, SpeakerPreset};
use autosub::model::ExitStatus;
use clap::{Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "autosub")]
#[command(version, about = "Chunked transcription pipeline for long-form audio")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Transcribe an input file, starting a new run.
    Transcribe {
        input: PathBuf,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        engine: Option<String>,

        #[arg(long)]
        language: Option<String>,

        #[arg(long = "chunk-sec")]
        chunk_sec: Option<f64>,

        #[arg(long = "overlap-sec")]
        overlap_sec: Option<f64>,

        #[arg(long)]
        workers: Option<usize>,

        #[arg(long = "run-dir")]
        run_dir: Option<PathBuf>,

        /// Named diarization preset: default, conversation, interview, custom.
        #[arg(long)]
        speaker: Option<String>,

        #[arg(long = "retain-chunks")]
        retain_chunks: bool,
    },
    /// Resume a previously started run from its run directory.
    Resume { run_dir: PathBuf },
    /// Print the manifest of an existing run directory.
    Status { run_dir: PathBuf },
}

fn apply_cli_overrides(
    mut config: Config,
    model: Option<String>,
    engine: Option<String>,
    language: Option<String>,
    chunk_sec: Option<f64>,
    overlap_sec: Option<f64>,
    workers: Option<usize>,
    speaker: Option<String>,
    retain_chunks: bool,
) -> Result<Config> {
    if let Some(model) = model {
        config.transcription.default_model = model;
    }
    if let Some(engine) = engine {
        config.transcription.default_engine =
            engine.parse::<Provider>().map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(language) = language {
        config.transcription.language = language;
    }
    if let Some(chunk_sec) = chunk_sec {
        config.chunking.chunk_seconds = chunk_sec;
    }
    if let Some(overlap_sec) = overlap_sec {
        config.chunking.overlap_seconds = overlap_sec;
    }
    if let Some(workers) = workers {
        config.scheduler.max_workers = workers;
    }
    if let Some(preset) = speaker {
        let preset: SpeakerPreset = preset.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        config.speaker = SpeakerConfig::from_preset(preset);
    }
    if retain_chunks {
        config.output.retain_chunks = true;
    }
    Ok(config)
}

fn print_manifest_summary(manifest: &autosub::model::RunManifest) {
    println!();
    println!("run:        {}", manifest.run_id);
    println!("source:     {}", manifest.source.path);
    println!("duration:   {:.1}s", manifest.source.duration_sec);
    println!("chunks:     {}", manifest.plan_chunk_count);
    println!(
        "completed:  {} / failed: {} / skipped: {}",
        manifest.stats.completed, manifest.stats.failed, manifest.stats.skipped
    );
    if let Some(status) = manifest.exit_status {
        println!("status:     {status:?}");
    } else {
        println!("status:     in progress");
    }
    for warning in &manifest.warnings {
        println!("warning:    {warning}");
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    autosub::logging::init(cli.verbose);

    let cancelled = Arc::new(AtomicBool::new(false));
    let cancelled_clone = Arc::clone(&cancelled);
    ctrlc::set_handler(move || {
        if cancelled_clone.load(Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!("\nreceived interrupt, cancelling (press again to force quit)...");
        cancelled_clone.store(true, Ordering::SeqCst);
    })
    .ok();

    match cli.command {
        Command::Transcribe {
            input,
            model,
            engine,
            language,
            chunk_sec,
            overlap_sec,
            workers,
            run_dir,
            speaker,
            retain_chunks,
        } => {
            if !input.exists() {
                anyhow::bail!("input file not found: {}", input.display());
            }

            let config = Config::load().context("failed to load configuration")?;
            let config = apply_cli_overrides(
                config,
                model,
                engine,
                language,
                chunk_sec,
                overlap_sec,
                workers,
                speaker,
                retain_chunks,
            )?;
            config.validate().context("configuration validation failed")?;

            info!(input = %input.display(), "starting transcription run");
            match autosub::run(&config, &input, run_dir, cancelled).await {
                Ok(report) => {
                    print_manifest_summary(&report.manifest);
                    let status = report.manifest.exit_status.unwrap_or(ExitStatus::Failed);
                    std::process::exit(status.exit_code());
                }
                Err(e) => {
                    error!("run failed: {e}");
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Resume { run_dir } => {
            if !run_dir.join("manifest.json").exists() {
                anyhow::bail!("{} has no manifest.json to resume from", run_dir.display());
            }
            let manifest = autosub::status(&run_dir).context("failed to read manifest")?;
            let config: Config = serde_json::from_value(manifest.config_snapshot.clone())
                .unwrap_or_default();
            let input = PathBuf::from(&manifest.source.path);

            match autosub::run(&config, &input, Some(run_dir), cancelled).await {
                Ok(report) => {
                    print_manifest_summary(&report.manifest);
                    let status = report.manifest.exit_status.unwrap_or(ExitStatus::Failed);
                    std::process::exit(status.exit_code());
                }
                Err(e) => {
                    error!("resume failed: {e}");
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Status { run_dir } => {
            let manifest = autosub::status(&run_dir).context("failed to read manifest")?;
            print_manifest_summary(&manifest);
        }
    }

    Ok(())
}

