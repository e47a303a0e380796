//! Error types for the native HTTP bridge.
//!
//! Transport failures are classified exactly once, at the native boundary, into
//! the portable [`ErrorKind`] taxonomy. Everything above that boundary treats a
//! [`NativeHttpError`] as an opaque kind plus an optional cause.

mod classifier;
mod error;
mod native;
mod tables;

pub use classifier::{Classification, ErrorClassifier, MessageRule};
pub use error::{ConfigError, ErrorKind, NativeHttpError, NativeHttpResult, PushError};
pub use native::{domains, reqwest_codes, NativeError};
