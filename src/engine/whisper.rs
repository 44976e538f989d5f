//! Concrete C3 engine: OpenAI's hosted Whisper transcription API. An
//! external collaborator behind the `Transcriber` interface — the core
//! only ever calls through the trait.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::audio::PcmSlice;
use crate::engine::{classify_http_status, EngineOptions, EngineOutput, Transcriber};
use crate::error::{AutosubError, ErrorKind, Result};
use crate::model::Segment;

const WHISPER_API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
/// OpenAI's upload limit for this endpoint.
const MAX_FILE_SIZE: usize = 25 * 1024 * 1024;

pub struct WhisperEngine {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl WhisperEngine {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            api_url: WHISPER_API_URL.to_string(),
        }
    }

    /// Point at a stubbed endpoint instead of the real OpenAI API.
    #[cfg(test)]
    fn with_base_url(api_key: String, model: String, api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            api_url,
        }
    }

    fn build_form(&self, wav_bytes: Vec<u8>, language: &str, options: &EngineOptions) -> Result<Form> {
        if wav_bytes.len() > MAX_FILE_SIZE {
            return Err(AutosubError::classified(
                ErrorKind::InputError,
                format!(
                    "chunk too large for whisper api: {} bytes (max {MAX_FILE_SIZE})",
                    wav_bytes.len()
                ),
            ));
        }

        let part = Part::bytes(wav_bytes)
            .file_name("chunk.wav")
            .mime_str("audio/wav")?;

        let mut form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        if !language.is_empty() {
            form = form.text("language", language.to_string());
        }
        if let Some(prompt) = &options.initial_prompt_text {
            form = form.text("prompt", prompt.clone());
        }
        if let Some(temp) = options.temperature {
            form = form.text("temperature", temp.to_string());
        }

        Ok(form)
    }

    async fn call_api(&self, form: Form) -> Result<WhisperResponse> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            let parsed: WhisperResponse = serde_json::from_str(&body)?;
            return Ok(parsed);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_http_status(status, &body))
    }
}

#[async_trait]
impl Transcriber for WhisperEngine {
    async fn transcribe(
        &self,
        pcm: &PcmSlice,
        language: &str,
        options: &EngineOptions,
    ) -> Result<EngineOutput> {
        let wav_bytes = pcm.to_wav_bytes()?;
        let form = self.build_form(wav_bytes, language, options)?;
        let response = self.call_api(form).await?;

        let segments = if let Some(api_segments) = response.segments {
            api_segments
                .into_iter()
                .map(|s| Segment {
                    start_sec: s.start,
                    end_sec: s.end,
                    text: s.text.trim().to_string(),
                    confidence: None,
                    words: None,
                    speaker: None,
                })
                .collect()
        } else {
            vec![Segment {
                start_sec: 0.0,
                end_sec: pcm.duration_sec(),
                text: response.text.trim().to_string(),
                confidence: None,
                words: None,
                speaker: None,
            }]
        };

        Ok(EngineOutput {
            segments,
            text: response.text,
            language_detected: Some(response.language),
            diagnostics: None,
        })
    }

    fn engine_id(&self) -> &'static str {
        "whisper"
    }

    fn model_id(&self) -> String {
        self.model.clone()
    }
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    segments: Option<Vec<WhisperSegment>>,
    language: String,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}
