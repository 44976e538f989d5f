//! Concrete C3 engine: Google Gemini, used as the inline-audio remote
//! variant. Gemini has no native segment/timestamp response format, so
//! this engine prompts for a `[MM:SS] text` transcript and parses it back
//! into `Segment`s with a regex — the same technique used by the
//! original Gemini-backed transcription path.

use async_trait::async_trait;
use base64::Engine as _;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::audio::PcmSlice;
use crate::engine::{classify_http_status, EngineOptions, EngineOutput, Transcriber};
use crate::error::Result;
use crate::model::Segment;

const GENERATE_CONTENT_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

pub struct GeminiEngine {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl GeminiEngine {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_url: GENERATE_CONTENT_URL.to_string(),
        }
    }

    /// Point at a stubbed endpoint instead of the real Gemini API.
    #[cfg(test)]
    fn with_base_url(api_key: String, api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_url,
        }
    }

    fn build_prompt(language: &str, options: &EngineOptions) -> String {
        let mut prompt = String::new();
        prompt.push_str("Transcribe this audio with precise timestamps.\n\n");
        prompt.push_str("Format each line as:\n[MM:SS] Text of what was said\n\n");
        if !language.is_empty() {
            prompt.push_str(&format!("The audio is in the '{language}' language.\n"));
        }
        if let Some(hint) = &options.initial_prompt_text {
            prompt.push_str(&format!("Vocabulary hint: {hint}\n"));
        }
        prompt.push_str("\nProvide accurate timestamps for each segment of speech.");
        prompt
    }

    async fn call_api(&self, pcm: &PcmSlice, language: &str, options: &EngineOptions) -> Result<String> {
        let wav_bytes = pcm.to_wav_bytes()?;
        let base64_audio = base64::engine::general_purpose::STANDARD.encode(&wav_bytes);

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: Self::build_prompt(language, options),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "audio/wav".to_string(),
                            data: base64_audio,
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_status(status, &body));
        }

        let body: GenerateContentResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| match p {
                Part::Text { text } => text,
                _ => String::new(),
            })
            .unwrap_or_default();

        Ok(text)
    }

    /// Parse a `[MM:SS] text` transcript into relative-time segments.
    fn parse_timestamped_text(raw: &str) -> Vec<Segment> {
        let re = Regex::new(r"^\[(\d{1,2}):(\d{2})\]\s*(.*)$").expect("static regex");
        let mut segments: Vec<Segment> = Vec::new();

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(caps) = re.captures(line) {
                let minutes: f64 = caps[1].parse().unwrap_or(0.0);
                let seconds: f64 = caps[2].parse().unwrap_or(0.0);
                let start = minutes * 60.0 + seconds;
                let text = caps[3].trim().to_string();

                if let Some(prev) = segments.last_mut() {
                    if prev.end_sec <= start {
                        prev.end_sec = start;
                    }
                }
                segments.push(Segment {
                    start_sec: start,
                    end_sec: start,
                    text,
                    confidence: None,
                    words: None,
                    speaker: None,
                });
            } else if let Some(prev) = segments.last_mut() {
                // Continuation line with no timestamp: append to the
                // previous segment's text.
                prev.text.push(' ');
                prev.text.push_str(line);
            }
        }

        segments
    }
}

#[async_trait]
impl Transcriber for GeminiEngine {
    async fn transcribe(
        &self,
        pcm: &PcmSlice,
        language: &str,
        options: &EngineOptions,
    ) -> Result<EngineOutput> {
        let raw = self.call_api(pcm, language, options).await?;
        let mut segments = Self::parse_timestamped_text(&raw);

        if segments.is_empty() {
            segments.push(Segment {
                start_sec: 0.0,
                end_sec: pcm.duration_sec(),
                text: raw.trim().to_string(),
                confidence: None,
                words: None,
                speaker: None,
            });
        } else if let Some(last) = segments.last_mut() {
            if last.end_sec <= last.start_sec {
                last.end_sec = pcm.duration_sec();
            }
        }

        let text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(EngineOutput {
            segments,
            text,
            language_detected: None,
            diagnostics: None,
        })
    }

    fn engine_id(&self) -> &'static str {
        "gemini"
    }

    fn model_id(&self) -> String {
        "gemini-2.0-flash".to_string()
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timestamped_lines_into_segments() {
        let raw = "[00:00] Hello there\n[00:05] how are you doing today";
        let segments = GeminiEngine::parse_timestamped_text(raw);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start_sec, 0.0);
        assert_eq!(segments[0].end_sec, 5.0);
        assert_eq!(segments[0].text, "Hello there");
        assert_eq!(segments[1].start_sec, 5.0);
        assert_eq!(segments[1].text, "how are you doing today");
    }

    #[test]
    fn continuation_lines_append_to_previous_segment() {
        let raw = "[01:05] first line\nstill talking without a timestamp";
        let segments = GeminiEngine::parse_timestamped_text(raw);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "first line still talking without a timestamp");
    }

    #[test]
    fn empty_response_produces_no_segments() {
        let segments = GeminiEngine::parse_timestamped_text("");
        assert!(segments.is_empty());
    }

    #[tokio::test]
    async fn transcribe_parses_generated_content_response() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let body = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{"text": "[00:00] hello there\n[00:02] general kenobi"}]
                }
            }]
        });
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let engine = GeminiEngine::with_base_url("key".into(), server.uri());
        let pcm = crate::audio::AudioSource::for_test(vec![0i16; 16000], 16000).slice(0.0, 1.0);
        let output = engine
            .transcribe(&pcm, "en", &EngineOptions::default())
            .await
            .unwrap();

        assert_eq!(output.segments.len(), 2);
        assert_eq!(output.segments[0].text, "hello there");
        assert_eq!(output.segments[1].text, "general kenobi");
    }

    #[tokio::test]
    async fn transcribe_maps_auth_error_to_permanent() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let engine = GeminiEngine::with_base_url("key".into(), server.uri());
        let pcm = crate::audio::AudioSource::for_test(vec![0i16; 16000], 16000).slice(0.0, 1.0);
        let err = engine
            .transcribe(&pcm, "en", &EngineOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::EnginePermanent);
    }
}
