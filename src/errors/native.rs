//! Native error signals as reported by transports.

use thiserror::Error;

/// Well-known native error domains.
pub mod domains {
    /// Foundation URL-loading system errors.
    pub const NS_URL: &str = "NSURLErrorDomain";
    /// CFNetwork errors.
    pub const CF_NETWORK: &str = "kCFErrorDomainCFNetwork";
    /// Errors raised by the built-in reqwest transport.
    pub const REQWEST: &str = "reqwest";
}

/// Codes reported in the [`domains::REQWEST`] domain.
pub mod reqwest_codes {
    /// Unclassified reqwest error.
    pub const UNKNOWN: i64 = 0;
    /// Request or read timed out.
    pub const TIMEOUT: i64 = 1;
    /// Connection could not be established.
    pub const CONNECT: i64 = 2;
    /// Redirect limit exceeded or redirect target invalid.
    pub const REDIRECT: i64 = 3;
    /// Request body could not be sent.
    pub const BODY: i64 = 4;
    /// Response body could not be decoded.
    pub const DECODE: i64 = 5;
    /// Request could not be built or sent.
    pub const REQUEST: i64 = 6;
    /// Leaf certificate rejected by the trust gate.
    pub const TRUST_REJECTED: i64 = 7;
    /// Response stream ended with an I/O error.
    pub const STREAM: i64 = 8;
    /// Call cancelled through the transport.
    pub const CANCELLED: i64 = 9;
}

/// A native error signal, either a domain/code pair or an exception object.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// Domain/code error.
    #[error("{domain} ({code}): {description}")]
    Domain {
        /// Error domain.
        domain: String,
        /// Numeric code within the domain.
        code: i64,
        /// Localized description.
        description: String,
    },
    /// Exception raised by an exception-based binding.
    #[error("{class}: {message}")]
    Exception {
        /// Fully qualified exception class.
        class: String,
        /// Exception message.
        message: String,
    },
}

impl NativeError {
    /// Creates a domain/code error.
    pub fn domain(domain: impl Into<String>, code: i64, description: impl Into<String>) -> Self {
        NativeError::Domain {
            domain: domain.into(),
            code,
            description: description.into(),
        }
    }

    /// Creates an exception error.
    pub fn exception(class: impl Into<String>, message: impl Into<String>) -> Self {
        NativeError::Exception {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Creates an error in the reqwest domain.
    pub fn reqwest(code: i64, description: impl Into<String>) -> Self {
        Self::domain(domains::REQWEST, code, description)
    }

    /// Returns the human-readable description.
    pub fn description(&self) -> &str {
        match self {
            NativeError::Domain { description, .. } => description,
            NativeError::Exception { message, .. } => message,
        }
    }
}

impl From<&reqwest::Error> for NativeError {
    fn from(err: &reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            reqwest_codes::TIMEOUT
        } else if err.is_connect() {
            reqwest_codes::CONNECT
        } else if err.is_redirect() {
            reqwest_codes::REDIRECT
        } else if err.is_body() {
            reqwest_codes::BODY
        } else if err.is_decode() {
            reqwest_codes::DECODE
        } else if err.is_request() {
            reqwest_codes::REQUEST
        } else {
            reqwest_codes::UNKNOWN
        };
        NativeError::reqwest(code, err.to_string())
    }
}
