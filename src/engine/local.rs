//! Concrete C3 engine: local CPU/GPU inference via `whisper-rs`, the
//! offline counterpart to the remote `whisper`/`gemini` variants. Built
//! only when the `local-engine` feature is enabled, since it links a
//! native whisper.cpp build.

use async_trait::async_trait;
use std::sync::Mutex;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::PcmSlice;
use crate::engine::{EngineOptions, EngineOutput, Transcriber};
use crate::error::{AutosubError, ErrorKind, Result};
use crate::model::Segment;

pub struct LocalEngine {
    ctx: Mutex<WhisperContext>,
    model_path: String,
}

impl LocalEngine {
    pub fn new(model_path: String) -> Result<Self> {
        let ctx = WhisperContext::new_with_params(&model_path, WhisperContextParameters::default())
            .map_err(|e| {
                AutosubError::classified(
                    ErrorKind::EnginePermanent,
                    format!("failed to load local model '{model_path}': {e}"),
                )
            })?;
        Ok(Self {
            ctx: Mutex::new(ctx),
            model_path,
        })
    }

    fn samples_to_f32(pcm: &PcmSlice) -> Vec<f32> {
        pcm.samples()
            .iter()
            .map(|&s| s as f32 / i16::MAX as f32)
            .collect()
    }
}

#[async_trait]
impl Transcriber for LocalEngine {
    async fn transcribe(
        &self,
        pcm: &PcmSlice,
        language: &str,
        options: &EngineOptions,
    ) -> Result<EngineOutput> {
        let samples = Self::samples_to_f32(pcm);
        let language = language.to_string();
        let beam_size = options.beam_size;

        // whisper.cpp's `full` call is CPU/GPU-bound and synchronous;
        // `block_in_place` hands this worker thread's other tasks to the
        // rest of the pool for the duration instead of stalling them.
        tokio::task::block_in_place(|| {
            let ctx_guard = self.ctx.lock().map_err(|_| {
                AutosubError::classified(ErrorKind::EnginePermanent, "local model mutex poisoned")
            })?;
            let ctx = &*ctx_guard;
            let mut state = ctx.create_state().map_err(|e| {
                AutosubError::classified(ErrorKind::EnginePermanent, format!("state init failed: {e}"))
            })?;

            let strategy = match beam_size {
                Some(n) if n > 1 => SamplingStrategy::BeamSearch {
                    beam_size: n as i32,
                    patience: 1.0,
                },
                _ => SamplingStrategy::Greedy { best_of: 1 },
            };
            let mut params = FullParams::new(strategy);
            if !language.is_empty() {
                params.set_language(Some(&language));
            }
            params.set_print_special(false);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);
            params.set_translate(false);

            state.full(params, &samples).map_err(|e| {
                AutosubError::classified(ErrorKind::EngineTransient, format!("whisper.cpp failed: {e}"))
            })?;

            let num_segments = state.full_n_segments().unwrap_or(0);
            let mut segments = Vec::with_capacity(num_segments as usize);
            let mut full_text = String::new();

            for i in 0..num_segments {
                let text = state.full_get_segment_text(i).unwrap_or_default();
                let start_sec = state.full_get_segment_t0(i).unwrap_or(0) as f64 / 100.0;
                let end_sec = state.full_get_segment_t1(i).unwrap_or(0) as f64 / 100.0;
                full_text.push_str(&text);
                full_text.push(' ');
                segments.push(Segment {
                    start_sec,
                    end_sec,
                    text: text.trim().to_string(),
                    confidence: None,
                    words: None,
                    speaker: None,
                });
            }

            Ok(EngineOutput {
                segments,
                text: full_text.trim().to_string(),
                language_detected: None,
                diagnostics: None,
            })
        })
    }

    fn engine_id(&self) -> &'static str {
        "local"
    }

    fn model_id(&self) -> String {
        self.model_path.clone()
    }
}
