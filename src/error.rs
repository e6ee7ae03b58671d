use thiserror::Error;

/// Substrings that mark a failure as one waiting will not fix.
pub const PERMANENT_ERROR_MARKERS: [&str; 3] = ["permission denied", "not allowed", "invalid session"];

/// Coarse classification of an [`Error`], carried by [`crate::SdkEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidConfiguration,
    InvalidInput,
    Signaling,
    Transport,
    ConnectionTimeout,
    MaxRetriesExceeded,
    NotConnected,
    Cancelled,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Failed to parse or serialize JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("API key is required and must be a non-empty string")]
    InvalidApiKey,

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Signaling error: {0}")]
    Signaling(String),

    #[error("WebRTC error: {0}")]
    Transport(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Max retries exceeded after {attempts} attempts: {last}")]
    MaxRetriesExceeded { attempts: u32, last: Box<Error> },

    #[error("The client is not connected")]
    NotConnected,

    #[error("The connection attempt was cancelled by disconnect")]
    Cancelled,

    #[error("The connection was closed unexpectedly")]
    ConnectionClosed,
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Url(_) | Self::InvalidApiKey | Self::InvalidBaseUrl(_) | Self::InvalidOptions(_) => {
                ErrorKind::InvalidConfiguration
            }
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::WebSocket(_) | Self::Serialization(_) | Self::Signaling(_) | Self::ConnectionClosed => {
                ErrorKind::Signaling
            }
            Self::Transport(_) => ErrorKind::Transport,
            Self::ConnectionTimeout => ErrorKind::ConnectionTimeout,
            Self::MaxRetriesExceeded { .. } => ErrorKind::MaxRetriesExceeded,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::WebSocket(_) | Self::Signaling(_) | Self::ConnectionClosed => "WEBSOCKET_ERROR",
            Self::Serialization(_) => "PROCESSING_ERROR",
            Self::Url(_) | Self::InvalidBaseUrl(_) => "INVALID_BASE_URL",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidOptions(_) => "INVALID_OPTIONS",
            Self::Transport(_) => "WEB_RTC_ERROR",
            Self::ConnectionTimeout => "CONNECTION_TIMEOUT",
            Self::MaxRetriesExceeded { .. } => "MAX_RETRIES_EXCEEDED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether retrying the failed operation is pointless.
    ///
    /// Configuration, input and cancellation errors are always permanent; anything else
    /// is permanent only when its message contains one of [`PERMANENT_ERROR_MARKERS`].
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        match self.kind() {
            ErrorKind::InvalidConfiguration
            | ErrorKind::InvalidInput
            | ErrorKind::Cancelled
            | ErrorKind::MaxRetriesExceeded => true,
            _ => {
                let message = self.to_string().to_lowercase();
                PERMANENT_ERROR_MARKERS.iter().any(|marker| message.contains(marker))
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_markers_are_permanent() {
        assert!(Error::Signaling("403 Permission Denied".to_string()).is_permanent());
        assert!(Error::Transport("operation not allowed".to_string()).is_permanent());
        assert!(Error::Signaling("Invalid session token".to_string()).is_permanent());
    }

    #[test]
    fn network_failures_are_transient() {
        assert!(!Error::ConnectionTimeout.is_permanent());
        assert!(!Error::Signaling("connection reset by peer".to_string()).is_permanent());
        assert!(!Error::Transport("peer connection failed".to_string()).is_permanent());
    }

    #[test]
    fn configuration_and_cancellation_are_permanent() {
        assert!(Error::InvalidApiKey.is_permanent());
        assert!(Error::InvalidInput("empty".to_string()).is_permanent());
        assert!(Error::Cancelled.is_permanent());
    }

    #[test]
    fn codes_follow_kind() {
        assert_eq!(Error::ConnectionTimeout.code(), "CONNECTION_TIMEOUT");
        assert_eq!(Error::InvalidApiKey.kind(), ErrorKind::InvalidConfiguration);
        let err = Error::MaxRetriesExceeded { attempts: 3, last: Box::new(Error::ConnectionTimeout) };
        assert_eq!(err.kind(), ErrorKind::MaxRetriesExceeded);
        assert!(err.to_string().contains("Connection timeout"));
    }
}
