//! Canonical error type.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Result type for bridge operations.
pub type NativeHttpResult<T> = Result<T, NativeHttpError>;

/// Portable transport error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request was cancelled by the caller (never a failure).
    Cancelled,
    /// The remote host could not be reached.
    ConnectFailure,
    /// The request timed out.
    Timeout,
    /// The host name could not be resolved.
    NameResolutionFailure,
    /// The response exceeded a length limit.
    MessageLengthLimitExceeded,
    /// The connection was closed prematurely.
    ConnectionClosed,
    /// The response violated the HTTP protocol (bad redirects, no response).
    ProtocolError,
    /// The request could not be sent.
    SendFailure,
    /// The response could not be received.
    ReceiveFailure,
    /// The server certificate was rejected, including pinning rejections.
    TrustFailure,
    /// The secure channel could not be established.
    SecureChannelFailure,
    /// The request was refused by a proxy.
    ProxyProhibited,
    /// Unmapped native error.
    Unknown,
}

impl ErrorKind {
    /// Returns true for the cancellation kind.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ErrorKind::Cancelled)
    }

    /// Returns true for TLS-related kinds.
    pub fn is_tls(&self) -> bool {
        matches!(self, ErrorKind::TrustFailure | ErrorKind::SecureChannelFailure)
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            ErrorKind::Cancelled => io::ErrorKind::Interrupted,
            ErrorKind::Timeout => io::ErrorKind::TimedOut,
            ErrorKind::ConnectFailure => io::ErrorKind::ConnectionRefused,
            ErrorKind::ConnectionClosed => io::ErrorKind::ConnectionAborted,
            ErrorKind::ProtocolError => io::ErrorKind::InvalidData,
            _ => io::ErrorKind::Other,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Cancelled => write!(f, "Request cancelled"),
            ErrorKind::ConnectFailure => write!(f, "Connect failure"),
            ErrorKind::Timeout => write!(f, "Timeout"),
            ErrorKind::NameResolutionFailure => write!(f, "Name resolution failure"),
            ErrorKind::MessageLengthLimitExceeded => write!(f, "Message length limit exceeded"),
            ErrorKind::ConnectionClosed => write!(f, "Connection closed"),
            ErrorKind::ProtocolError => write!(f, "Protocol error"),
            ErrorKind::SendFailure => write!(f, "Send failure"),
            ErrorKind::ReceiveFailure => write!(f, "Receive failure"),
            ErrorKind::TrustFailure => write!(f, "Trust failure"),
            ErrorKind::SecureChannelFailure => write!(f, "Secure channel failure"),
            ErrorKind::ProxyProhibited => write!(f, "Request prohibited by proxy"),
            ErrorKind::Unknown => write!(f, "Unknown error"),
        }
    }
}

/// Classified transport error.
///
/// Cloning is cheap: the cause is shared, so one classified value can fail both
/// the response promise and the body stream, and be handed out again by every
/// read of a failed stream.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct NativeHttpError {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl NativeHttpError {
    /// Creates a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "The request was cancelled")
    }

    /// Creates a trust failure.
    pub fn trust(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TrustFailure, message)
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolError, message)
    }

    /// Sets the underlying cause.
    pub fn with_cause<E: StdError + Send + Sync + 'static>(mut self, cause: E) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the underlying cause, if any.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Returns true if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.kind.is_cancellation()
    }
}

impl From<NativeHttpError> for io::Error {
    fn from(err: NativeHttpError) -> Self {
        io::Error::new(err.kind.io_kind(), err)
    }
}

/// Returned when a chunk is pushed to a stream that already reached a terminal state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The stream was completed.
    #[error("cannot push to a completed stream")]
    Completed,
    /// The stream was failed.
    #[error("cannot push to a failed stream")]
    Failed,
}

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A pin is not of the form `sha256/<base64 SHA-256 digest>`.
    #[error("invalid pin for {host}: {pin}")]
    InvalidPin {
        /// Host the pin was registered for.
        host: String,
        /// The offending pin.
        pin: String,
    },
    /// An environment variable could not be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidEnv {
        /// Variable name.
        name: String,
        /// Raw value.
        value: String,
    },
    /// The redirect limit must allow at least one hop.
    #[error("max_redirects must be greater than zero")]
    ZeroRedirects,
    /// The HTTP client backing a transport could not be built.
    #[error("failed to build transport: {0}")]
    Transport(String),
}
