//! Error types for ytplay core

use thiserror::Error;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;

/// How far an error is allowed to travel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Shown to the user, the player closes
    Fatal,
    /// Handled by the fallback protocol
    Recoverable,
    /// Terminal for the adaptive path, reported once
    Terminal,
    /// Logged and swallowed
    Cosmetic,
    /// Rejected synchronously with a visible message
    UserRejected,
    /// Programming or setup error
    Internal,
}

/// Controller error types
#[derive(Error, Debug)]
pub enum Error {
    // File info errors
    #[error("{message}")]
    FileInfo { status: u16, message: String },

    #[error("Failed to decode file info: {0}")]
    FileInfoDecode(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Playback errors
    #[error("Media source failed: {0}")]
    SourceError(String),

    #[error("Failed to construct adaptive streaming engine: {0}")]
    EngineConstruction(String),

    #[error("Adaptive streaming failed: {0}")]
    EngineFatal(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Playback session already destroyed")]
    SessionDestroyed,

    // User actions
    #[error("Cannot switch to HLS: this file has no video stream")]
    AudioOnlyFallback,

    #[error("Already using HLS streaming")]
    AlreadyAdaptive,

    // Best-effort failures
    #[error("Subtitle sync failed: {0}")]
    Subtitle(String),

    #[error("Poster capture failed: {0}")]
    PosterCapture(String),

    #[error("Platform call failed: {0}")]
    Platform(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a platform error
    pub fn platform(msg: impl Into<String>) -> Self {
        Error::Platform(msg.into())
    }

    /// Where this error sits in the propagation policy
    pub fn severity(&self) -> Severity {
        match self {
            Error::FileInfo { .. } | Error::FileInfoDecode(_) | Error::Network(_) => {
                Severity::Fatal
            }
            Error::SourceError(_) => Severity::Recoverable,
            Error::EngineConstruction(_) | Error::EngineFatal(_) => Severity::Terminal,
            Error::Subtitle(_) | Error::PosterCapture(_) | Error::Platform(_) => {
                Severity::Cosmetic
            }
            Error::AudioOnlyFallback | Error::AlreadyAdaptive => Severity::UserRejected,
            Error::InvalidStateTransition { .. }
            | Error::SessionDestroyed
            | Error::InvalidConfig(_)
            | Error::Json(_)
            | Error::Url(_)
            | Error::Io(_) => Severity::Internal,
        }
    }

    /// Returns true if the user should see this error
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self.severity(),
            Severity::Fatal | Severity::Terminal | Severity::UserRejected
        )
    }

    /// Returns the error code for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::FileInfo { .. } => "FILE_INFO",
            Error::FileInfoDecode(_) => "FILE_INFO_DECODE",
            Error::Network(_) => "NETWORK",
            Error::SourceError(_) => "SOURCE_ERROR",
            Error::EngineConstruction(_) => "ENGINE_CONSTRUCT",
            Error::EngineFatal(_) => "ENGINE_FATAL",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::SessionDestroyed => "SESSION_DESTROYED",
            Error::AudioOnlyFallback => "AUDIO_ONLY_FALLBACK",
            Error::AlreadyAdaptive => "ALREADY_ADAPTIVE",
            Error::Subtitle(_) => "SUBTITLE",
            Error::PosterCapture(_) => "POSTER_CAPTURE",
            Error::Platform(_) => "PLATFORM",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Url(_) => "URL",
            Error::Io(_) => "IO",
        }
    }
}
