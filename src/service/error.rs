//! Service error types and their user-facing classification.

use thiserror::Error;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Coarse failure class shown to the user.
///
/// | Kind            | Cause                                        | Retry same action? |
/// |-----------------|----------------------------------------------|--------------------|
/// | `Configuration` | API key missing or rejected                  | No, fix config     |
/// | `Network`       | connect failure, timeout, throttling         | Yes                |
/// | `Service`       | error status or unusable payload             | No                 |
/// | `Input`         | empty text, unreadable image, bad tap        | No                 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Network,
    Service,
    Input,
}

impl ErrorKind {
    /// One stable, actionable message per kind.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => {
                "Configuration error: no valid API key. Set GEMINI_API_KEY or service.api_key in settings.toml."
            }
            ErrorKind::Network => {
                "Could not reach the service. Check your connection and try again."
            }
            ErrorKind::Service => "The service could not process this request.",
            ErrorKind::Input => "This input cannot be processed.",
        }
    }

    /// `true` when repeating the same user action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Network)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::Network => "NetworkError",
            ErrorKind::Service => "ServiceError",
            ErrorKind::Input => "InputError",
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

/// Errors returned by the detection, translation and synthesis collaborators.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// No API key in the config file or the environment.
    #[error("no API key configured")]
    MissingApiKey,

    /// The backend refused the credentials.
    #[error("API key rejected (HTTP {status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Transport-level failure (DNS, connect, reset).
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The call did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The backend asked us to slow down or the request timed out server-side.
    #[error("service is busy (HTTP {status}): {message}")]
    Throttled { status: u16, message: String },

    /// Any other non-success HTTP status.
    #[error("service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The payload could not be decoded.
    #[error("failed to parse service response: {0}")]
    Parse(String),

    /// The speech model answered without any audio part.
    #[error("speech service returned no audio (finish reason: {finish_reason})")]
    NoAudio { finish_reason: String },

    /// Text to synthesise was empty after trimming.
    #[error("nothing to speak: text is empty")]
    EmptyText,

    /// The selected bytes are not an image we can send.
    #[error("unsupported image: {0}")]
    InvalidImage(String),
}

impl ServiceError {
    /// Classify an unsuccessful HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ServiceError::Unauthorized { status, message },
            408 | 429 => ServiceError::Throttled { status, message },
            _ => ServiceError::Status { status, message },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::MissingApiKey | ServiceError::Unauthorized { .. } => {
                ErrorKind::Configuration
            }
            ServiceError::Request(_) | ServiceError::Timeout | ServiceError::Throttled { .. } => {
                ErrorKind::Network
            }
            ServiceError::Status { .. } | ServiceError::Parse(_) | ServiceError::NoAudio { .. } => {
                ErrorKind::Service
            }
            ServiceError::EmptyText | ServiceError::InvalidImage(_) => ErrorKind::Input,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if e.is_decode() {
            ServiceError::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            ServiceError::from_status(status.as_u16(), e.to_string())
        } else {
            ServiceError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
