//! Native error classification.

use std::collections::HashMap;

use super::error::{ErrorKind, NativeHttpError};
use super::native::{domains, NativeError};
use super::tables;

/// Outcome of classifying a native error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A reserved cancellation code. Never reported as a failure.
    Cancelled,
    /// A failure of the given kind.
    Failure(ErrorKind),
}

impl Classification {
    /// Returns the canonical kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Classification::Cancelled => ErrorKind::Cancelled,
            Classification::Failure(kind) => *kind,
        }
    }
}

/// Matching rule applied to exception messages (ASCII case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRule {
    /// Message starts with the text.
    Prefix(&'static str),
    /// Message contains the text.
    Contains(&'static str),
}

impl MessageRule {
    fn matches(&self, message: &str) -> bool {
        let message = message.to_ascii_lowercase();
        match self {
            MessageRule::Prefix(prefix) => message.starts_with(&prefix.to_ascii_lowercase()),
            MessageRule::Contains(needle) => message.contains(&needle.to_ascii_lowercase()),
        }
    }
}

/// Maps native error signals onto the canonical taxonomy.
///
/// Tables are data, keyed by native domain; supporting a new binding means
/// registering another table rather than editing match arms.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    domains: HashMap<String, HashMap<i64, Classification>>,
    message_rules: Vec<(MessageRule, Classification)>,
    exception_classes: HashMap<String, Classification>,
}

impl ErrorClassifier {
    /// Creates a classifier with no tables; everything classifies as `Unknown`.
    pub fn empty() -> Self {
        Self {
            domains: HashMap::new(),
            message_rules: Vec::new(),
            exception_classes: HashMap::new(),
        }
    }

    /// Creates a classifier with the built-in tables.
    pub fn new() -> Self {
        let mut classifier = Self::empty();
        classifier.register_domain(domains::NS_URL, tables::NS_URL_ERRORS);
        classifier.register_domain(domains::CF_NETWORK, tables::CF_NETWORK_ERRORS);
        classifier.register_domain(domains::REQWEST, tables::REQWEST_ERRORS);
        classifier
            .message_rules
            .extend_from_slice(tables::EXCEPTION_MESSAGE_RULES);
        for (class, classification) in tables::EXCEPTION_CLASSES {
            classifier
                .exception_classes
                .insert((*class).to_string(), *classification);
        }
        classifier
    }

    /// Registers (or extends) the table for a native domain.
    pub fn register_domain(&mut self, domain: impl Into<String>, table: &[(i64, Classification)]) {
        let entries = self.domains.entry(domain.into()).or_default();
        for (code, classification) in table {
            entries.insert(*code, *classification);
        }
    }

    /// Registers an exception class.
    pub fn register_exception(&mut self, class: impl Into<String>, classification: Classification) {
        self.exception_classes.insert(class.into(), classification);
    }

    /// Looks up a native error without building an error value.
    pub fn lookup(&self, native: &NativeError) -> Option<Classification> {
        match native {
            NativeError::Domain { domain, code, .. } => {
                self.domains.get(domain.as_str())?.get(code).copied()
            }
            NativeError::Exception { class, message } => self
                .message_rules
                .iter()
                .find(|(rule, _)| rule.matches(message))
                .map(|(_, classification)| *classification)
                .or_else(|| self.exception_classes.get(class.as_str()).copied()),
        }
    }

    /// Classifies a native error. The native error is kept as the cause.
    pub fn classify(&self, native: &NativeError) -> NativeHttpError {
        let kind = self
            .lookup(native)
            .map(|c| c.kind())
            .unwrap_or(ErrorKind::Unknown);

        NativeHttpError::new(kind, native.description()).with_cause(native.clone())
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::reqwest_codes;
    use test_case::test_case;

    #[test_case(-999, ErrorKind::Cancelled ; "cancelled")]
    #[test_case(-1012, ErrorKind::Cancelled ; "user cancelled authentication")]
    #[test_case(-1004, ErrorKind::ConnectFailure ; "cannot connect")]
    #[test_case(-1001, ErrorKind::Timeout ; "timed out")]
    #[test_case(-1003, ErrorKind::NameResolutionFailure ; "cannot find host")]
    #[test_case(-1103, ErrorKind::MessageLengthLimitExceeded ; "data too long")]
    #[test_case(-1005, ErrorKind::ConnectionClosed ; "connection lost")]
    #[test_case(-1007, ErrorKind::ProtocolError ; "too many redirects")]
    #[test_case(-1021, ErrorKind::SendFailure ; "body stream exhausted")]
    #[test_case(-1017, ErrorKind::ReceiveFailure ; "cannot parse response")]
    #[test_case(-1200, ErrorKind::SecureChannelFailure ; "secure connection failed")]
    #[test_case(-1202, ErrorKind::TrustFailure ; "certificate untrusted")]
    #[test_case(-42, ErrorKind::Unknown ; "unmapped")]
    fn test_ns_url_table(code: i64, expected: ErrorKind) {
        let classifier = ErrorClassifier::new();
        let err = classifier.classify(&NativeError::domain(domains::NS_URL, code, "x"));
        assert_eq!(err.kind(), expected);
    }

    #[test_case(1, ErrorKind::NameResolutionFailure ; "host not found")]
    #[test_case(-72005, ErrorKind::Cancelled ; "net service cancel")]
    #[test_case(-72007, ErrorKind::Timeout ; "net service timeout")]
    #[test_case(302, ErrorKind::ConnectionClosed ; "http connection lost")]
    #[test_case(304, ErrorKind::ProtocolError ; "redirect loop")]
    #[test_case(303, ErrorKind::SendFailure ; "http parse failure")]
    #[test_case(113, ErrorKind::ReceiveFailure ; "socks4 unknown status")]
    #[test_case(306, ErrorKind::ProxyProhibited ; "proxy connection failure")]
    #[test_case(2, ErrorKind::Unknown ; "host unknown")]
    fn test_cf_network_table(code: i64, expected: ErrorKind) {
        let classifier = ErrorClassifier::new();
        let err = classifier.classify(&NativeError::domain(domains::CF_NETWORK, code, "x"));
        assert_eq!(err.kind(), expected);
    }

    #[test]
    fn test_reqwest_table() {
        let classifier = ErrorClassifier::new();
        let err = classifier.classify(&NativeError::reqwest(reqwest_codes::TRUST_REJECTED, "pin"));
        assert_eq!(err.kind(), ErrorKind::TrustFailure);
        let err = classifier.classify(&NativeError::reqwest(reqwest_codes::UNKNOWN, "?"));
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_unknown_domain_preserves_cause() {
        let classifier = ErrorClassifier::new();
        let native = NativeError::domain("WinHttpErrorDomain", 12002, "The operation timed out");
        let err = classifier.classify(&native);

        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.message(), "The operation timed out");
        assert_eq!(
            err.cause().map(|c| c.to_string()),
            Some(native.to_string())
        );
    }

    #[test]
    fn test_exception_message_rules() {
        let classifier = ErrorClassifier::new();

        let pinned = NativeError::exception(
            "javax.net.ssl.SSLPeerUnverifiedException",
            "Certificate pinning failure!\n  Peer certificate chain: ...",
        );
        assert_eq!(classifier.classify(&pinned).kind(), ErrorKind::TrustFailure);

        let cancelled = NativeError::exception("java.io.IOException", "Canceled");
        assert!(classifier.classify(&cancelled).is_cancelled());

        let timeout = NativeError::exception("java.net.SocketTimeoutException", "timeout");
        assert_eq!(classifier.classify(&timeout).kind(), ErrorKind::Timeout);

        let other = NativeError::exception("java.lang.IllegalStateException", "closed");
        assert_eq!(classifier.classify(&other).kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_register_domain_is_additive() {
        let mut classifier = ErrorClassifier::new();
        classifier.register_domain(
            "WinHttpErrorDomain",
            &[(12002, Classification::Failure(ErrorKind::Timeout)), (12017, Classification::Cancelled)],
        );

        let timeout = NativeError::domain("WinHttpErrorDomain", 12002, "timeout");
        assert_eq!(classifier.classify(&timeout).kind(), ErrorKind::Timeout);
        let cancelled = NativeError::domain("WinHttpErrorDomain", 12017, "aborted");
        assert!(classifier.classify(&cancelled).is_cancelled());

        // Built-in tables are untouched.
        let ns = NativeError::domain(domains::NS_URL, -1001, "timeout");
        assert_eq!(classifier.classify(&ns).kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_empty_classifier() {
        let classifier = ErrorClassifier::empty();
        let err = classifier.classify(&NativeError::domain(domains::NS_URL, -999, "cancelled"));
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }
}
