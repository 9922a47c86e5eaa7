//! Configuration options for the WrangleBot client.

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Reconnection policy handed to the transport.
///
/// The delay before attempt `n` is `initial_delay * 2^n`, randomized by
/// `randomization_factor` and capped at `max_delay`.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    pub randomization_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            max_attempts: None,
            randomization_factor: 0.5,
        }
    }
}

/// Configuration for the WrangleBot client.
#[derive(Clone, Debug)]
pub struct Config {
    /// Host URL of the WrangleBot server (e.g. "http://127.0.0.1:3200").
    pub base_url: String,
    /// Versioned REST URL every façade call is prefixed with.
    pub version: String,
    /// Explicit socket URL; derived from `base_url` when unset.
    pub socket_url: Option<String>,
    /// Deadline for the connect handshake.
    pub timeout: Duration,
    /// Optional timeout for HTTP requests.
    pub request_timeout: Option<Duration>,
    /// Token used for REST calls before anyone signs in.
    pub token: Option<String>,
    pub reconnect: ReconnectConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3200".into(),
            version: "http://127.0.0.1:3200/api/v1".into(),
            socket_url: None,
            timeout: Duration::from_millis(60000),
            request_timeout: None,
            token: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Config {
    /// Creates a configuration for the given host, with the REST API under `/api/v1`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            version: format!("{base_url}/api/v1"),
            base_url,
            ..Self::default()
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into().trim_end_matches('/').to_string();
        self
    }

    pub fn socket_url(mut self, url: impl Into<String>) -> Self {
        self.socket_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Resolves the URL the Socket.IO client dials; the protocol path is added by the client.
    pub fn resolve_socket_url(&self) -> Result<Url> {
        let url = Url::parse(self.socket_url.as_deref().unwrap_or(&self.base_url))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::Validation(format!(
                "unsupported socket scheme '{other}'"
            ))),
        }
    }
}
