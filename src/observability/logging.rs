//! Subscriber setup for the bridge's `tracing` events.
//!
//! Bridge events carry `request_id` and `host` fields. `NATIVE_HTTP_LOG`
//! takes `EnvFilter` directives and overrides the configured level.

use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable read for filter directives.
pub const LOG_ENV_VAR: &str = "NATIVE_HTTP_LOG";

const CRATE_TARGET: &str = "integrations_native_http";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human-readable output
    #[default]
    Pretty,
    /// JSON lines
    Json,
    /// Single-line output
    Compact,
}

/// How the bridge's events are collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Most verbose level kept.
    pub level: Level,
    /// Output format.
    pub format: LogFormat,
    /// Restrict the default filter to this crate's events.
    pub bridge_only: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            bridge_only: false,
        }
    }
}

impl LoggingConfig {
    /// Info-level pretty output for every target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Keeps only events emitted by the bridge unless `NATIVE_HTTP_LOG` says otherwise.
    pub fn bridge_only(mut self, bridge_only: bool) -> Self {
        self.bridge_only = bridge_only;
        self
    }

    /// Default directive used when `NATIVE_HTTP_LOG` is unset.
    pub fn directive(&self) -> String {
        let level = LevelFilter::from_level(self.level);
        if self.bridge_only {
            format!("{}={}", CRATE_TARGET, level)
        } else {
            level.to_string()
        }
    }

    fn filter(&self) -> EnvFilter {
        let filter = EnvFilter::builder();
        match std::env::var(LOG_ENV_VAR) {
            Ok(directives) if !directives.trim().is_empty() => filter.parse_lossy(directives),
            _ => filter.parse_lossy(self.directive()),
        }
    }

    /// Installs the global subscriber. Call once at startup.
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed.
    pub fn init(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let output = match self.format {
            LogFormat::Pretty => fmt::layer().pretty().boxed(),
            LogFormat::Json => fmt::layer().json().boxed(),
            LogFormat::Compact => fmt::layer().compact().boxed(),
        };

        tracing_subscriber::registry()
            .with(self.filter())
            .with(output)
            .try_init()?;
        Ok(())
    }
}
