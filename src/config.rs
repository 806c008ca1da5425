//! Client configuration.
//!
//! [`ClientConfig`] carries everything a client is constructed from: the
//! mandatory base address, instance-level default headers, the transport
//! deadline, an optional client-wide cancellation token, and a couple of
//! options forwarded verbatim to the transport builder. Sensible defaults
//! come from [`ClientConfig::new`]; the fluent [`ClientConfig::builder`]
//! validates on `build`.
//!
//! # Examples
//!
//! ```rust
//! use steadyfetch::ClientConfig;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::builder("https://api.example.com")
//!     .timeout(Duration::from_secs(5))
//!     .user_agent("steadyfetch/0.1")
//!     .build()?; // returns Result<ClientConfig, ConfigError>
//! # Ok(()) }
//! ```

use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Deadline applied when neither the config nor the call overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Construction options for [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Absolute base address every call path is resolved against.
    pub base_url: String,
    /// Merged over the `Accept`/`Content-Type` JSON defaults.
    pub default_headers: HeaderMap,
    /// Transport deadline applied when a call has no override.
    pub timeout: Duration,
    /// Client-level cancellation token raced against every call.
    pub cancel: Option<CancellationToken>,
    /// Forwarded verbatim to the transport builder.
    pub user_agent: Option<String>,
    /// Redirect hop limit, forwarded verbatim to the transport builder.
    pub max_redirects: Option<usize>,
    /// Pre-built transport. When set, the passthrough options above are
    /// ignored because the handle is already configured.
    pub transport: Option<reqwest::Client>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> ClientConfig {
        ClientConfig {
            base_url: base_url.into(),
            default_headers: HeaderMap::new(),
            timeout: DEFAULT_TIMEOUT,
            cancel: None,
            user_agent: None,
            max_redirects: None,
            transport: None,
        }
    }

    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            inner: ClientConfig::new(base_url),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        parse_base_url(&self.base_url)?;
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    inner: ClientConfig,
}

impl ClientConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut ClientConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    /// Set or replace one instance-level default header.
    pub fn default_header(self, name: HeaderName, value: HeaderValue) -> Self {
        self.map(|c| {
            c.default_headers.insert(name, value);
        })
    }

    /// Replace the whole instance-level default header set.
    pub fn default_headers(self, headers: HeaderMap) -> Self {
        self.map(|c| c.default_headers = headers)
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        self.map(|c| c.timeout = timeout)
    }

    pub fn timeout_ms(self, ms: u64) -> Self {
        self.map(|c| c.timeout = Duration::from_millis(ms))
    }

    pub fn cancel(self, token: CancellationToken) -> Self {
        self.map(|c| c.cancel = Some(token))
    }

    pub fn user_agent<S: Into<String>>(self, ua: S) -> Self {
        self.map(|c| c.user_agent = Some(ua.into()))
    }

    pub fn max_redirects(self, n: usize) -> Self {
        self.map(|c| c.max_redirects = Some(n))
    }

    /// Supply a pre-built transport instead of building one.
    pub fn transport(self, client: reqwest::Client) -> Self {
        self.map(|c| c.transport = Some(client))
    }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut ClientConfig)) -> Self {
        self.map(f)
    }

    /// Validate and build the final config.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("base address `{url}` is not an absolute URL: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Parse an absolute base address.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|source| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })
}
