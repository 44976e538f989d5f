use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AutosubError, Result};

/// Output formats the Output Assembler (C8) can be asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Txt,
    Docx,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "txt" => Ok(OutputFormat::Txt),
            "docx" => Ok(OutputFormat::Docx),
            _ => Err(format!("unknown output format: {s}. use json, txt or docx")),
        }
    }
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Txt => "txt",
            OutputFormat::Docx => "docx",
        }
    }
}

/// The transcription-engine variant selected by configuration. The core
/// (C3/C5) only sees the `Transcriber` trait; this enum exists purely so
/// the CLI/config layer can choose a concrete implementation without the
/// core branching on it (spec section 9: "chosen by configuration, not by
/// type introspection").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Whisper,
    Gemini,
    Local,
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Provider::Whisper),
            "gemini" => Ok(Provider::Gemini),
            "local" => Ok(Provider::Local),
            _ => Err(format!("unknown engine: {s}")),
        }
    }
}

/// ISO codes the DOCX writer renders right-to-left.
pub const RTL_LANGUAGES: &[&str] = &["he", "ar", "fa", "ur", "yi"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub default_model: String,
    pub default_engine: Provider,
    pub language: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            default_model: "whisper-1".to_string(),
            default_engine: Provider::default(),
            language: "he".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_seconds: f64,
    pub overlap_seconds: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_seconds: 30.0,
            overlap_seconds: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub max_workers: usize,
    pub max_attempts: u32,
    pub chunk_timeout_sec: u64,
    pub fail_threshold_fraction: f64,
    pub cancel_grace_sec: u64,
    pub unknown_max_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_attempts: 3,
            chunk_timeout_sec: 600,
            fail_threshold_fraction: 0.25,
            cancel_grace_sec: 30,
            unknown_max_retries: 2,
        }
    }
}

/// Named diarization tuning presets (`--speaker=<preset>`), grounded in the
/// original implementation's `speaker_config_factory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerPreset {
    #[default]
    Default,
    Conversation,
    Interview,
    Custom,
}

impl std::str::FromStr for SpeakerPreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(SpeakerPreset::Default),
            "conversation" => Ok(SpeakerPreset::Conversation),
            "interview" => Ok(SpeakerPreset::Interview),
            "custom" => Ok(SpeakerPreset::Custom),
            _ => Err(format!("unknown speaker preset: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerConfig {
    pub enabled: bool,
    pub turn_gap_sec: f64,
    pub preset: SpeakerPreset,
    pub expected_speakers: Option<u32>,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            turn_gap_sec: 3.0,
            preset: SpeakerPreset::default(),
            expected_speakers: None,
        }
    }
}

impl SpeakerConfig {
    /// Apply a named preset's tuning on top of the defaults, grounded in
    /// `speaker_config_factory.py`'s per-preset knobs.
    pub fn from_preset(preset: SpeakerPreset) -> Self {
        let mut cfg = Self {
            enabled: true,
            preset,
            ..Self::default()
        };
        match preset {
            SpeakerPreset::Default => {}
            SpeakerPreset::Conversation => {
                cfg.turn_gap_sec = 1.5;
                cfg.expected_speakers = Some(2);
            }
            SpeakerPreset::Interview => {
                cfg.turn_gap_sec = 2.0;
                cfg.expected_speakers = Some(2);
            }
            SpeakerPreset::Custom => {}
        }
        cfg
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub formats: Vec<OutputFormat>,
    pub retain_chunks: bool,
    pub run_dir_root: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            formats: vec![OutputFormat::Json, OutputFormat::Txt],
            retain_chunks: true,
            run_dir_root: PathBuf::from("./runs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub transcription: TranscriptionConfig,
    pub chunking: ChunkingConfig,
    pub scheduler: SchedulerConfig,
    pub speaker: SpeakerConfig,
    pub output: OutputConfig,
    /// OpenAI credential for the Whisper engine variant.
    pub openai_api_key: Option<String>,
    /// Google credential for the Gemini engine variant.
    pub gemini_api_key: Option<String>,
    pub debug: bool,
}

impl Config {
    /// Load defaults, overlay the config file if present, then overlay
    /// environment variables (section 10.3: flag > env > file > default;
    /// flags are applied by the CLI layer on top of what this returns).
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::config_file_path() {
            if path.exists() {
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("GEMINI_API_KEY") {
            self.gemini_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("AUTOSUB_DEFAULT_MODEL") {
            self.transcription.default_model = v;
        }
        if let Ok(v) = std::env::var("AUTOSUB_DEFAULT_ENGINE") {
            if let Ok(p) = v.parse() {
                self.transcription.default_engine = p;
            }
        }
        if std::env::var("AUTOSUB_DEBUG").is_ok() {
            self.debug = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduler.max_workers == 0 {
            return Err(AutosubError::Config(
                "scheduler.max_workers must be greater than 0".to_string(),
            ));
        }
        if self.chunking.overlap_seconds <= 0.0
            || self.chunking.overlap_seconds >= self.chunking.chunk_seconds
        {
            return Err(AutosubError::Config(
                "chunking.overlap_seconds must be in (0, chunk_seconds)".to_string(),
            ));
        }
        match self.transcription.default_engine {
            Provider::Whisper if self.openai_api_key.is_none() => {
                return Err(AutosubError::Config(
                    "OPENAI_API_KEY not set; required for the whisper engine".to_string(),
                ));
            }
            Provider::Gemini if self.gemini_api_key.is_none() => {
                return Err(AutosubError::Config(
                    "GEMINI_API_KEY not set; required for the gemini engine".to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("autosub").join("config.toml"))
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dir) = dirs::config_dir() {
            let autosub_dir = dir.join("autosub");
            std::fs::create_dir_all(&autosub_dir)?;
            let path = autosub_dir.join("config.toml");
            let toml_content = toml::to_string_pretty(self)
                .map_err(|e| AutosubError::Config(format!("failed to serialize config: {e}")))?;
            std::fs::write(path, toml_content)?;
        }
        Ok(())
    }
}
