//! Error types for the comedy backend.

use thiserror::Error;

/// Whether a failed call is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Connection drops, timeouts, upstream 5xx/429. Safe to repeat.
    Transient,
    /// Bad input, bad credentials, malformed model output.
    Permanent,
}

#[derive(Error, Debug)]
pub enum ComicError {
    #[error("Unknown persona: {0}")]
    UnknownPersona(String),

    #[error("Invalid round count: expected {min}-{max}, got {actual}")]
    InvalidRoundCount { min: u32, max: u32, actual: u32 },

    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} responded with status {status}: {body}")]
    UpstreamStatus {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{0} returned an empty reply")]
    EmptyReply(String),

    #[error("Could not parse model output: {0}")]
    MalformedOutput(String),

    #[error("TTS service unavailable: out of credits or invalid API key")]
    TtsCreditsExceeded,

    #[error("TTS error: {0}")]
    TtsError(String),

    #[error("Audio encoding error: {0}")]
    Audio(#[from] hound::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComicError {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::Http(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                FailureClass::Transient
            }
            Self::UpstreamStatus { status, .. } if *status == 429 || *status >= 500 => {
                FailureClass::Transient
            }
            Self::OpenAIError(async_openai::error::OpenAIError::Reqwest(_)) => FailureClass::Transient,
            Self::Io(e) => match e.kind() {
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof => FailureClass::Transient,
                _ => FailureClass::Permanent,
            },
            _ => FailureClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.failure_class() == FailureClass::Transient
    }
}
