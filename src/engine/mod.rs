//! C3: Engine Interface.
//!
//! A narrow capability (`transcribe`, optional `close`) that every
//! concrete speech-recognition backend implements. The core is polymorphic
//! over this trait and never branches on which concrete engine is
//! plugged in (spec section 4.3/9) — selection happens once, in
//! configuration, via `create_engine`.

pub mod gemini;
#[cfg(feature = "local-engine")]
pub mod local;
pub mod whisper;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::audio::PcmSlice;
use crate::config::{Config, Provider};
use crate::error::{AutosubError, ErrorKind, Result};
use crate::model::Segment;

/// The recognized-option enumeration from spec section 4.3, passed through
/// to engines as a typed struct rather than an opaque map (section 9:
/// "define explicit record types").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOptions {
    pub beam_size: Option<u32>,
    pub vad_enabled: bool,
    pub word_timestamps: bool,
    pub initial_prompt_text: Option<String>,
    pub temperature: Option<f32>,
    pub suppress_tokens: Vec<i32>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            beam_size: None,
            vad_enabled: false,
            word_timestamps: false,
            initial_prompt_text: None,
            temperature: None,
            suppress_tokens: Vec::new(),
        }
    }
}

/// `{ segments[], text, languageDetected?, diagnostics? }` from spec
/// section 4.3. Segment times here are **relative to the slice start**;
/// the scheduler (C5) shifts them to absolute before persisting.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub segments: Vec<Segment>,
    pub text: String,
    pub language_detected: Option<String>,
    pub diagnostics: Option<String>,
}

/// `transcribe(pcmSlice, sampleRate, language, options) -> ...`
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        pcm: &PcmSlice,
        language: &str,
        options: &EngineOptions,
    ) -> Result<EngineOutput>;

    /// Stable identifier persisted into `ChunkResult.engine_id`.
    fn engine_id(&self) -> &'static str;

    /// Model identifier persisted into `ChunkResult.model_id`.
    fn model_id(&self) -> String;

    /// Optional teardown (releasing a local model, closing a connection
    /// pool). Default no-op for engines with nothing to release.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Map a transport-level failure (HTTP status, local-engine return code)
/// onto the C11 taxonomy. Centralized here so every engine classifies the
/// same way instead of each guessing independently.
pub fn classify_http_status(status: reqwest::StatusCode, body: &str) -> AutosubError {
    let kind = if status.as_u16() == 429 || status.is_server_error() {
        ErrorKind::EngineTransient
    } else if status.as_u16() == 401 || status.as_u16() == 403 {
        ErrorKind::EnginePermanent
    } else if status.is_client_error() {
        ErrorKind::InputError
    } else {
        ErrorKind::Unknown
    };
    AutosubError::classified(kind, format!("engine http {status}: {body}"))
}

/// Build the configured engine variant. The core never matches on
/// `Provider` again after this point.
pub fn create_engine(config: &Config) -> Result<Box<dyn Transcriber>> {
    match config.transcription.default_engine {
        Provider::Whisper => {
            let key = config.openai_api_key.clone().ok_or_else(|| {
                AutosubError::Config("OPENAI_API_KEY required for whisper engine".to_string())
            })?;
            Ok(Box::new(whisper::WhisperEngine::new(
                key,
                config.transcription.default_model.clone(),
            )))
        }
        Provider::Gemini => {
            let key = config.gemini_api_key.clone().ok_or_else(|| {
                AutosubError::Config("GEMINI_API_KEY required for gemini engine".to_string())
            })?;
            Ok(Box::new(gemini::GeminiEngine::new(key)))
        }
        Provider::Local => {
            #[cfg(feature = "local-engine")]
            {
                Ok(Box::new(local::LocalEngine::new(
                    config.transcription.default_model.clone(),
                )?))
            }
            #[cfg(not(feature = "local-engine"))]
            {
                Err(AutosubError::Config(
                    "local engine selected but crate was built without the 'local-engine' feature"
                        .to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_classify_transient() {
        let err = classify_http_status(reqwest::StatusCode::SERVICE_UNAVAILABLE, "busy");
        assert_eq!(err.kind(), ErrorKind::EngineTransient);
    }

    #[test]
    fn auth_errors_classify_permanent() {
        let err = classify_http_status(reqwest::StatusCode::UNAUTHORIZED, "bad key");
        assert_eq!(err.kind(), ErrorKind::EnginePermanent);
    }

    #[test]
    fn bad_request_classifies_input_error() {
        let err = classify_http_status(reqwest::StatusCode::BAD_REQUEST, "bad file");
        assert_eq!(err.kind(), ErrorKind::InputError);
    }
}
