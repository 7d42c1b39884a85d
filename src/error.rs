use std::io;
use thiserror::Error;

/// Custom error type for the NCP application
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("capability not supported: {0}")]
    Unsupported(String),

    #[error("transient hardware error: {0}")]
    Transient(String),

    #[error("remote service error: {0}")]
    Remote(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("malformed payload: {0}")]
    Decode(String),

    #[error("operation timed out")]
    Timeout,

    #[error("invalid registry entry: {0}")]
    Registry(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for the NCP application
pub type Result<T> = std::result::Result<T, ControlError>;

/// Failure classification recorded into a failed Sample.
///
/// `Unsupported` and `Decode` are final for the attempt that produced them;
/// the other kinds are eligible for in-tick retries. Rate-limit responses
/// are recorded as `Remote` (the rate-limit state only stretches backoff).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unsupported,
    Transient,
    Remote,
    Decode,
    Timeout,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Unsupported => "unsupported",
            FailureKind::Transient => "transient",
            FailureKind::Remote => "remote",
            FailureKind::Decode => "decode",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

impl ControlError {
    /// Create an unsupported-capability error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        ControlError::Unsupported(msg.into())
    }

    /// Create a transient hardware error
    pub fn transient<S: Into<String>>(msg: S) -> Self {
        ControlError::Transient(msg.into())
    }

    /// Create a remote service error
    pub fn remote<S: Into<String>>(msg: S) -> Self {
        ControlError::Remote(msg.into())
    }

    /// Create a rate-limited error
    pub fn rate_limited<S: Into<String>>(msg: S) -> Self {
        ControlError::RateLimited(msg.into())
    }

    /// Create a decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        ControlError::Decode(msg.into())
    }

    /// Create a registry validation error
    pub fn registry<S: Into<String>>(msg: S) -> Self {
        ControlError::Registry(msg.into())
    }

    /// The kind recorded into a failed Sample for this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ControlError::Unsupported(_) => FailureKind::Unsupported,
            ControlError::Transient(_) => FailureKind::Transient,
            ControlError::Remote(_) | ControlError::RateLimited(_) => FailureKind::Remote,
            ControlError::Decode(_) => FailureKind::Decode,
            ControlError::Timeout => FailureKind::Timeout,
            ControlError::Registry(_) => FailureKind::Transient,
            ControlError::Io(_) => FailureKind::Transient,
            ControlError::Http(e) => {
                if e.is_timeout() {
                    FailureKind::Timeout
                } else if e.is_decode() {
                    FailureKind::Decode
                } else {
                    FailureKind::Remote
                }
            }
        }
    }

    /// Whether the ticker may retry this failure within the same tick.
    pub fn retryable(&self) -> bool {
        !matches!(
            self.failure_kind(),
            FailureKind::Unsupported | FailureKind::Decode
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ControlError::RateLimited(_))
    }
}
