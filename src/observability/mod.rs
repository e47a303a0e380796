//! Observability: structured logging setup and bridge counters.
//!
//! ```rust,no_run
//! use integrations_native_http::observability::{LogFormat, LoggingConfig};
//! use tracing::Level;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! LoggingConfig::new()
//!     .with_level(Level::DEBUG)
//!     .with_format(LogFormat::Json)
//!     .bridge_only(true)
//!     .init()?;
//! # Ok(())
//! # }
//! ```

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;
