//! Configuration for the request bridge.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::errors::ConfigError;
use crate::pinning::is_well_formed_pin;
use crate::transport::Transport;
use crate::{DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT_SECS};

/// Which transport carries the calls.
#[derive(Debug, Clone, Default)]
pub enum TransportKind {
    /// The built-in reqwest transport.
    #[default]
    Reqwest,
    /// A caller-supplied native binding.
    Custom(Arc<dyn Transport>),
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct NativeHttpConfig {
    /// Follow redirects proposed by the transport.
    pub allow_auto_redirect: bool,
    /// Keep responses out of the transport's cache and always reload.
    pub disable_caching: bool,
    /// Overall request timeout, applied by the built-in transport.
    pub timeout: Duration,
    /// Redirect hops the built-in transport follows before failing.
    pub max_redirects: usize,
    /// Transport variant.
    pub transport: TransportKind,
    /// Pins registered when the bridge is created, per host.
    pub pins: Vec<(String, Vec<String>)>,
    /// Override trust anchors (DER).
    pub trusted_certificates: Option<Vec<Bytes>>,
}

impl Default for NativeHttpConfig {
    fn default() -> Self {
        Self {
            allow_auto_redirect: true,
            disable_caching: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            transport: TransportKind::Reqwest,
            pins: Vec::new(),
            trusted_certificates: None,
        }
    }
}

impl NativeHttpConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> NativeHttpConfigBuilder {
        NativeHttpConfigBuilder::default()
    }

    /// Creates a configuration from `NATIVE_HTTP_*` environment variables.
    ///
    /// - `NATIVE_HTTP_ALLOW_AUTO_REDIRECT`: `true`/`false`
    /// - `NATIVE_HTTP_DISABLE_CACHING`: `true`/`false`
    /// - `NATIVE_HTTP_TIMEOUT`: seconds
    /// - `NATIVE_HTTP_MAX_REDIRECTS`: hop count
    /// - `NATIVE_HTTP_PINS`: `host=pin,pin;host=pin`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(value) = lookup("NATIVE_HTTP_ALLOW_AUTO_REDIRECT") {
            builder = builder.allow_auto_redirect(parse_var("NATIVE_HTTP_ALLOW_AUTO_REDIRECT", &value)?);
        }
        if let Some(value) = lookup("NATIVE_HTTP_DISABLE_CACHING") {
            builder = builder.disable_caching(parse_var("NATIVE_HTTP_DISABLE_CACHING", &value)?);
        }
        if let Some(value) = lookup("NATIVE_HTTP_TIMEOUT") {
            let secs: u64 = parse_var("NATIVE_HTTP_TIMEOUT", &value)?;
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(value) = lookup("NATIVE_HTTP_MAX_REDIRECTS") {
            builder = builder.max_redirects(parse_var("NATIVE_HTTP_MAX_REDIRECTS", &value)?);
        }
        if let Some(value) = lookup("NATIVE_HTTP_PINS") {
            for (host, pins) in parse_pins(&value)? {
                builder = builder.pins(host, pins);
            }
        }

        builder.build()
    }

    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_redirects == 0 && self.allow_auto_redirect {
            return Err(ConfigError::ZeroRedirects);
        }
        for (host, pins) in &self.pins {
            if let Some(pin) = pins.iter().find(|pin| !is_well_formed_pin(pin)) {
                return Err(ConfigError::InvalidPin {
                    host: host.clone(),
                    pin: pin.clone(),
                });
            }
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_pins(value: &str) -> Result<Vec<(String, Vec<String>)>, ConfigError> {
    value
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (host, pins) = entry.split_once('=').ok_or_else(|| ConfigError::InvalidEnv {
                name: "NATIVE_HTTP_PINS".to_string(),
                value: entry.to_string(),
            })?;
            let pins = pins
                .split(',')
                .map(str::trim)
                .filter(|pin| !pin.is_empty())
                .map(String::from)
                .collect();
            Ok((host.trim().to_string(), pins))
        })
        .collect()
}

/// Builder for [`NativeHttpConfig`].
#[derive(Debug, Default)]
pub struct NativeHttpConfigBuilder {
    allow_auto_redirect: Option<bool>,
    disable_caching: Option<bool>,
    timeout: Option<Duration>,
    max_redirects: Option<usize>,
    transport: Option<TransportKind>,
    pins: Vec<(String, Vec<String>)>,
    trusted_certificates: Option<Vec<Bytes>>,
}

impl NativeHttpConfigBuilder {
    /// Sets whether redirects are followed.
    pub fn allow_auto_redirect(mut self, allow: bool) -> Self {
        self.allow_auto_redirect = Some(allow);
        self
    }

    /// Sets whether responses bypass the cache.
    pub fn disable_caching(mut self, disable: bool) -> Self {
        self.disable_caching = Some(disable);
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the redirect hop limit.
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = Some(max_redirects);
        self
    }

    /// Selects the transport variant.
    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses a caller-supplied transport.
    pub fn custom_transport(self, transport: Arc<dyn Transport>) -> Self {
        self.transport(TransportKind::Custom(transport))
    }

    /// Adds pins for a host.
    pub fn pins<I, S>(mut self, host: impl Into<String>, pins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pins
            .push((host.into(), pins.into_iter().map(Into::into).collect()));
        self
    }

    /// Sets the override trust anchors (DER).
    pub fn trusted_certificates(mut self, certificates: Vec<Bytes>) -> Self {
        self.trusted_certificates = Some(certificates);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<NativeHttpConfig, ConfigError> {
        let defaults = NativeHttpConfig::default();
        let config = NativeHttpConfig {
            allow_auto_redirect: self.allow_auto_redirect.unwrap_or(defaults.allow_auto_redirect),
            disable_caching: self.disable_caching.unwrap_or(defaults.disable_caching),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            max_redirects: self.max_redirects.unwrap_or(defaults.max_redirects),
            transport: self.transport.unwrap_or(defaults.transport),
            pins: self.pins,
            trusted_certificates: self.trusted_certificates,
        };
        config.validate()?;
        Ok(config)
    }
}
