//! # Native HTTP bridge
//!
//! Adapts callback-driven native HTTP stacks into a pull-based
//! request/response API, with certificate pinning and a portable error
//! taxonomy.
//!
//! ## Features
//!
//! - Push-to-pull body streaming with cooperative, cancellable reads
//! - Certificate pinning by SHA-256 digest of the leaf certificate
//! - Data-driven classification of native error codes
//! - Pluggable transports, with a built-in reqwest transport
//! - Structured logging through `tracing`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_native_http::{create_bridge, NativeHttpConfig, NativeRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = NativeHttpConfig::builder()
//!         .allow_auto_redirect(true)
//!         .build()?;
//!     let bridge = create_bridge(config)?;
//!
//!     let request = NativeRequest::get("https://example.com/".parse()?);
//!     let response = bridge.send(request, CancellationToken::new()).await?;
//!     let status = response.status;
//!     println!("{} {}", status, response.text().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - `bridge` - Request bridge and response types
//! - `stream` - Push-to-pull byte stream buffer
//! - `pinning` - Certificate pin registry
//! - `errors` - Error types and native error classification
//! - `transport` - Transport capability and the reqwest transport
//! - `config` - Configuration types and builder
//! - `types` - Requests, calls and progress types
//! - `observability` - Logging setup and counters
//! - `mocks` - Mock transport and trust object for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bridge;
pub mod config;
pub mod errors;
pub mod mocks;
pub mod observability;
pub mod pinning;
pub mod stream;
pub mod transport;
pub mod types;

pub use bridge::{
    create_bridge, create_bridge_from_env, NativeResponse, RequestBridge, RequestState, ResponseBody,
};
pub use config::{NativeHttpConfig, NativeHttpConfigBuilder, TransportKind};
pub use errors::{
    Classification, ConfigError, ErrorClassifier, ErrorKind, NativeError, NativeHttpError,
    NativeHttpResult, PushError,
};
pub use observability::{BridgeMetrics, LogFormat, LoggingConfig, MetricsSnapshot};
pub use pinning::CertificatePinner;
pub use stream::{StreamReader, StreamWriter};
pub use transport::{
    AuthChallenge, ReqwestTransport, ServerTrust, Transport, TransportEvents, TrustDisposition,
};
pub use types::{
    CachePolicy, NativeCall, NativeRequest, Progress, ProgressCallback, RedirectDecision,
    RedirectRequest, RequestBody, RequestId, ResponseHead,
};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 100;

/// Default number of redirect hops followed.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
