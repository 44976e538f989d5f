//! End-to-end scheduler/store tests against a mock engine.
//!
//! The two remote engines (Whisper, Gemini) stub their actual HTTP calls
//! with `wiremock` in their own `#[cfg(test)]` modules, since their base
//! URL is a private implementation detail not reachable from here. What
//! this file covers instead is the surface reachable from outside the
//! crate: a real `Transcriber` driven through `Scheduler` and persisted
//! through `ChunkStore`, against audio decoded by the real C1 loader.

use std::process::Command;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use autosub::audio::{plan, AudioSource, PcmSlice};
use autosub::config::Config;
use autosub::engine::{EngineOptions, EngineOutput, Transcriber};
use autosub::error::{AutosubError, ErrorKind, Result};
use autosub::model::{ChunkResult, ChunkStatus, Segment};
use autosub::progress::ProgressSink;
use autosub::scheduler::Scheduler;
use autosub::store::ChunkStore;

fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Write a one-second, 8kHz tone to `path` as a 16-bit PCM WAV, the
/// smallest input the real C1 loader can decode.
fn write_test_wav(path: &std::path::Path) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..8000 {
        let sample = ((i as f64 * 0.05).sin() * 4000.0) as i16;
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

struct CountingMockEngine {
    calls: AtomicU32,
    fail_first_n: u32,
}

#[async_trait]
impl Transcriber for CountingMockEngine {
    async fn transcribe(
        &self,
        pcm: &PcmSlice,
        _language: &str,
        _options: &EngineOptions,
    ) -> Result<EngineOutput> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first_n {
            return Err(AutosubError::classified(
                ErrorKind::EngineTransient,
                "mock transient failure",
            ));
        }
        Ok(EngineOutput {
            segments: vec![Segment {
                start_sec: 0.0,
                end_sec: pcm.duration_sec(),
                text: "mock transcript".to_string(),
                confidence: None,
                words: None,
                speaker: None,
            }],
            text: "mock transcript".to_string(),
            language_detected: Some("en".to_string()),
            diagnostics: None,
        })
    }

    fn engine_id(&self) -> &'static str {
        "mock"
    }

    fn model_id(&self) -> String {
        "mock-v1".to_string()
    }
}

#[tokio::test]
async fn scheduler_drains_real_audio_through_store_with_retry() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not available");
        return;
    }

    let input_dir = tempfile::tempdir().unwrap();
    let wav_path = input_dir.path().join("tone.wav");
    write_test_wav(&wav_path);

    let source = Arc::new(AudioSource::load(&wav_path, 16000).await.unwrap());
    let chunks = plan(source.duration_sec, 30.0, 5.0).unwrap();
    assert_eq!(chunks.len(), 1);

    let run_dir = tempfile::tempdir().unwrap();
    let store = ChunkStore::new(run_dir.path()).unwrap();
    let work: Vec<ChunkResult> = chunks
        .iter()
        .map(|c| ChunkResult::pending(c.index, c.start_sec, c.end_sec))
        .collect();

    let progress = Arc::new(ProgressSink::new(work.len()));
    let cancel = Arc::new(AtomicBool::new(false));
    let engine: Arc<dyn Transcriber> = Arc::new(CountingMockEngine {
        calls: AtomicU32::new(0),
        fail_first_n: 1,
    });

    let scheduler = Scheduler::new(engine, store.clone(), &Config::default(), progress, cancel);
    let outcome = scheduler.run(Arc::clone(&source), work).await;

    assert!(!outcome.aborted);
    assert_eq!(outcome.stats.completed, 1);
    assert_eq!(outcome.stats.failed, 0);

    let persisted = store.list().unwrap();
    assert_eq!(persisted.len(), 1);
    let result = store.read(0).unwrap();
    assert_eq!(result.status, ChunkStatus::Completed);
    assert_eq!(result.segments[0].text, "mock transcript");
}

#[tokio::test]
async fn scheduler_gives_up_a_permanently_failing_chunk() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not available");
        return;
    }

    let input_dir = tempfile::tempdir().unwrap();
    let wav_path = input_dir.path().join("tone.wav");
    write_test_wav(&wav_path);

    let source = Arc::new(AudioSource::load(&wav_path, 16000).await.unwrap());
    let run_dir = tempfile::tempdir().unwrap();
    let store = ChunkStore::new(run_dir.path()).unwrap();

    let work = vec![ChunkResult::pending(0, 0.0, source.duration_sec)];
    let progress = Arc::new(ProgressSink::new(1));
    let cancel = Arc::new(AtomicBool::new(false));
    let engine: Arc<dyn Transcriber> = Arc::new(CountingMockEngine {
        calls: AtomicU32::new(0),
        fail_first_n: 999,
    });

    let scheduler = Scheduler::new(engine, store.clone(), &Config::default(), progress, cancel);
    let outcome = scheduler.run(source, work).await;

    assert_eq!(outcome.stats.failed, 1);
    let result = store.read(0).unwrap();
    assert_eq!(result.status, ChunkStatus::Failed);
}
