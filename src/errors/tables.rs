//! Native error code tables.
//!
//! One table per native domain. Codes absent from a table classify as
//! [`ErrorKind::Unknown`].

use super::classifier::Classification::{self, Cancelled, Failure};
use super::classifier::MessageRule;
use super::error::ErrorKind as K;
use super::native::reqwest_codes;

/// Foundation `NSURLErrorDomain` codes.
pub(crate) static NS_URL_ERRORS: &[(i64, Classification)] = &[
    (-999, Cancelled),  // Cancelled
    (-1012, Cancelled), // UserCancelledAuthentication
    (-1000, Failure(K::ConnectFailure)), // BadURL
    (-1002, Failure(K::ConnectFailure)), // UnsupportedURL
    (-1004, Failure(K::ConnectFailure)), // CannotConnectToHost
    (-1008, Failure(K::ConnectFailure)), // ResourceUnavailable
    (-1009, Failure(K::ConnectFailure)), // NotConnectedToInternet
    (-1013, Failure(K::ConnectFailure)), // UserAuthenticationRequired
    (-1018, Failure(K::ConnectFailure)), // InternationalRoamingOff
    (-1019, Failure(K::ConnectFailure)), // CallIsActive
    (-1020, Failure(K::ConnectFailure)), // DataNotAllowed
    (-1001, Failure(K::Timeout)),
    (-1003, Failure(K::NameResolutionFailure)), // CannotFindHost
    (-1006, Failure(K::NameResolutionFailure)), // DNSLookupFailed
    (-1103, Failure(K::MessageLengthLimitExceeded)),
    (-1005, Failure(K::ConnectionClosed)), // NetworkConnectionLost
    (-1007, Failure(K::ProtocolError)), // HTTPTooManyRedirects
    (-1010, Failure(K::ProtocolError)), // RedirectToNonExistentLocation
    (-1021, Failure(K::SendFailure)), // RequestBodyStreamExhausted
    (-1011, Failure(K::ReceiveFailure)), // BadServerResponse
    (-1014, Failure(K::ReceiveFailure)), // ZeroByteResource
    (-1015, Failure(K::ReceiveFailure)), // CannotDecodeRawData
    (-1016, Failure(K::ReceiveFailure)), // CannotDecodeContentData
    (-1017, Failure(K::ReceiveFailure)), // CannotParseResponse
    (-1100, Failure(K::ReceiveFailure)), // FileDoesNotExist
    (-1101, Failure(K::ReceiveFailure)), // FileIsDirectory
    (-1102, Failure(K::ReceiveFailure)), // NoPermissionsToReadFile
    (-2000, Failure(K::ReceiveFailure)), // CannotLoadFromNetwork
    (-3000, Failure(K::ReceiveFailure)), // CannotCreateFile
    (-3001, Failure(K::ReceiveFailure)), // CannotOpenFile
    (-3002, Failure(K::ReceiveFailure)), // CannotCloseFile
    (-3003, Failure(K::ReceiveFailure)), // CannotWriteToFile
    (-3004, Failure(K::ReceiveFailure)), // CannotRemoveFile
    (-3005, Failure(K::ReceiveFailure)), // CannotMoveFile
    (-3006, Failure(K::ReceiveFailure)), // DownloadDecodingFailedMidStream
    (-3007, Failure(K::ReceiveFailure)), // DownloadDecodingFailedToComplete
    (-1200, Failure(K::SecureChannelFailure)), // SecureConnectionFailed
    (-1201, Failure(K::TrustFailure)), // ServerCertificateHasBadDate
    (-1202, Failure(K::TrustFailure)), // ServerCertificateUntrusted
    (-1203, Failure(K::TrustFailure)), // ServerCertificateHasUnknownRoot
    (-1204, Failure(K::TrustFailure)), // ServerCertificateNotYetValid
    (-1205, Failure(K::TrustFailure)), // ClientCertificateRejected
    (-1206, Failure(K::TrustFailure)), // ClientCertificateRequired
];

/// `kCFErrorDomainCFNetwork` codes.
pub(crate) static CF_NETWORK_ERRORS: &[(i64, Classification)] = &[
    (-999, Cancelled),    // URL cancelled
    (-1012, Cancelled),   // URL user cancelled authentication
    (-72005, Cancelled),  // NetService cancel
    (122, Failure(K::ConnectFailure)), // SOCKS5 bad credentials
    (123, Failure(K::ConnectFailure)), // SOCKS5 unsupported negotiation method
    (124, Failure(K::ConnectFailure)), // SOCKS5 no acceptable method
    (300, Failure(K::ConnectFailure)), // HTTP authentication type unsupported
    (301, Failure(K::ConnectFailure)), // HTTP bad credentials
    (305, Failure(K::ConnectFailure)), // HTTP bad URL
    (-1000, Failure(K::ConnectFailure)),
    (-1002, Failure(K::ConnectFailure)),
    (-1004, Failure(K::ConnectFailure)),
    (-1008, Failure(K::ConnectFailure)),
    (-1009, Failure(K::ConnectFailure)),
    (-1013, Failure(K::ConnectFailure)),
    (-1018, Failure(K::ConnectFailure)),
    (-1019, Failure(K::ConnectFailure)),
    (-1020, Failure(K::ConnectFailure)),
    (-1001, Failure(K::Timeout)),
    (-72007, Failure(K::Timeout)), // NetService timeout
    (1, Failure(K::NameResolutionFailure)), // host not found
    (-1003, Failure(K::NameResolutionFailure)),
    (-1006, Failure(K::NameResolutionFailure)),
    (-73000, Failure(K::NameResolutionFailure)), // NetService DNS failure
    (-1103, Failure(K::MessageLengthLimitExceeded)),
    (302, Failure(K::ConnectionClosed)), // HTTP connection lost
    (-1005, Failure(K::ConnectionClosed)),
    (304, Failure(K::ProtocolError)), // HTTP redirection loop
    (-1007, Failure(K::ProtocolError)),
    (-1010, Failure(K::ProtocolError)),
    (100, Failure(K::SendFailure)), // SOCKS unknown client version
    (101, Failure(K::SendFailure)), // SOCKS unsupported server version
    (303, Failure(K::SendFailure)), // HTTP parse failure
    (-1021, Failure(K::SendFailure)),
    (110, Failure(K::ReceiveFailure)), // SOCKS4 request failed
    (111, Failure(K::ReceiveFailure)), // SOCKS4 identd failed
    (112, Failure(K::ReceiveFailure)), // SOCKS4 id conflict
    (113, Failure(K::ReceiveFailure)), // SOCKS4 unknown status
    (120, Failure(K::ReceiveFailure)), // SOCKS5 bad state
    (121, Failure(K::ReceiveFailure)), // SOCKS5 bad response address
    (-1011, Failure(K::ReceiveFailure)),
    (-1014, Failure(K::ReceiveFailure)),
    (-1015, Failure(K::ReceiveFailure)),
    (-1016, Failure(K::ReceiveFailure)),
    (-1017, Failure(K::ReceiveFailure)),
    (-1100, Failure(K::ReceiveFailure)),
    (-1101, Failure(K::ReceiveFailure)),
    (-1102, Failure(K::ReceiveFailure)),
    (-2000, Failure(K::ReceiveFailure)),
    (-3000, Failure(K::ReceiveFailure)),
    (-3001, Failure(K::ReceiveFailure)),
    (-3002, Failure(K::ReceiveFailure)),
    (-3003, Failure(K::ReceiveFailure)),
    (-3004, Failure(K::ReceiveFailure)),
    (-3005, Failure(K::ReceiveFailure)),
    (-3006, Failure(K::ReceiveFailure)),
    (-3007, Failure(K::ReceiveFailure)),
    (-4000, Failure(K::ReceiveFailure)), // cookie file unparseable
    (-72000, Failure(K::ReceiveFailure)), // NetService unknown
    (-72001, Failure(K::ReceiveFailure)), // NetService collision
    (-72002, Failure(K::ReceiveFailure)), // NetService not found
    (-72003, Failure(K::ReceiveFailure)), // NetService in progress
    (-72004, Failure(K::ReceiveFailure)), // NetService bad argument
    (-72006, Failure(K::ReceiveFailure)), // NetService invalid
    (-1201, Failure(K::TrustFailure)),
    (-1202, Failure(K::TrustFailure)),
    (-1203, Failure(K::TrustFailure)),
    (-1204, Failure(K::TrustFailure)),
    (-1205, Failure(K::TrustFailure)),
    (-1206, Failure(K::TrustFailure)),
    (-1200, Failure(K::SecureChannelFailure)),
    (306, Failure(K::ProxyProhibited)), // HTTP proxy connection failure
    (307, Failure(K::ProxyProhibited)), // HTTP bad proxy credentials
    (308, Failure(K::ProxyProhibited)), // PAC file error
    (309, Failure(K::ProxyProhibited)), // PAC file auth
    (310, Failure(K::ProxyProhibited)), // HTTPS proxy connection failure
    (311, Failure(K::ProxyProhibited)), // unexpected response to CONNECT
];

/// Codes produced by the reqwest transport.
pub(crate) static REQWEST_ERRORS: &[(i64, Classification)] = &[
    (reqwest_codes::CANCELLED, Cancelled),
    (reqwest_codes::TIMEOUT, Failure(K::Timeout)),
    (reqwest_codes::CONNECT, Failure(K::ConnectFailure)),
    (reqwest_codes::REDIRECT, Failure(K::ProtocolError)),
    (reqwest_codes::BODY, Failure(K::SendFailure)),
    (reqwest_codes::REQUEST, Failure(K::SendFailure)),
    (reqwest_codes::DECODE, Failure(K::ReceiveFailure)),
    (reqwest_codes::STREAM, Failure(K::ReceiveFailure)),
    (reqwest_codes::TRUST_REJECTED, Failure(K::TrustFailure)),
];

/// Message rules for exception-based bindings, checked in order.
pub(crate) static EXCEPTION_MESSAGE_RULES: &[(MessageRule, Classification)] = &[
    (
        MessageRule::Prefix("certificate pinning failure"),
        Failure(K::TrustFailure),
    ),
    (MessageRule::Contains("canceled"), Cancelled),
];

/// Exception classes for exception-based bindings.
pub(crate) static EXCEPTION_CLASSES: &[(&str, Classification)] = &[
    ("java.net.SocketTimeoutException", Failure(K::Timeout)),
    ("java.io.InterruptedIOException", Failure(K::Timeout)),
    ("java.net.UnknownHostException", Failure(K::NameResolutionFailure)),
    ("java.net.ConnectException", Failure(K::ConnectFailure)),
    ("java.net.NoRouteToHostException", Failure(K::ConnectFailure)),
    ("java.net.ProtocolException", Failure(K::ProtocolError)),
    ("java.net.SocketException", Failure(K::ConnectionClosed)),
    ("java.io.EOFException", Failure(K::ConnectionClosed)),
    ("javax.net.ssl.SSLHandshakeException", Failure(K::SecureChannelFailure)),
    ("javax.net.ssl.SSLPeerUnverifiedException", Failure(K::TrustFailure)),
];
