//! Client configuration.
//!
//! The production API lives under `https://lknpd.nalog.ru/api/v1/`. Tests and
//! sandboxes point `base_url` at the mock server instead.

use std::time::Duration;

use url::Url;

use crate::error::{NalogError, Result};

pub const DEFAULT_BASE_URL: &str = "https://lknpd.nalog.ru/api";
pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 11_2_2) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/88.0.4324.192 Safari/537.36";
pub const DEFAULT_APP_VERSION: &str = "1.0.0";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Versioned API root. Must end with `/` so relative paths resolve under it.
    pub base_url: Url,
    /// Sent as `User-Agent` and inside the device info; empty disables the header.
    pub user_agent: String,
    /// Upper bound for a single HTTP round-trip, on top of any context deadline.
    pub timeout: Option<Duration>,
    /// Reported as `appVersion` in the device info.
    pub app_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(&format!("{DEFAULT_BASE_URL}/{DEFAULT_API_VERSION}/"))
                .expect("default base URL is a valid constant"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            app_version: DEFAULT_APP_VERSION.to_string(),
        }
    }
}

impl ClientConfig {
    /// Configuration for a custom API root such as a local mock server.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| NalogError::Configuration(format!("invalid base URL {base_url:?}: {e}")))?;
        Ok(Self {
            base_url,
            ..Self::default()
        })
    }

    /// Production configuration for another API version, e.g. `v2`.
    pub fn with_version(version: &str) -> Result<Self> {
        Self::new(&format!("{DEFAULT_BASE_URL}/{version}/"))
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read overrides from `NALOG_BASE_URL`, `NALOG_USER_AGENT` and
    /// `NALOG_TIMEOUT_SECS` on top of the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("NALOG_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => {
                let url = url.trim();
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(NalogError::Configuration(
                        "NALOG_BASE_URL must start with http:// or https://".to_string(),
                    ));
                }
                Self::new(url)?
            }
            _ => Self::default(),
        };

        if let Ok(user_agent) = std::env::var("NALOG_USER_AGENT") {
            config.user_agent = user_agent;
        }

        if let Ok(raw) = std::env::var("NALOG_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                NalogError::Configuration(format!("NALOG_TIMEOUT_SECS must be a whole number, got {raw:?}"))
            })?;
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        tracing::debug!(base_url = %config.base_url, timeout = ?config.timeout, "client configuration loaded");
        Ok(config)
    }

    /// Resolve `path` against the base URL.
    ///
    /// Fails when the base URL path does not end in `/`, since `Url::join`
    /// would otherwise silently drop its last segment.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        if !self.base_url.path().ends_with('/') {
            return Err(NalogError::Configuration(format!(
                "base URL must have a trailing slash, but {:?} does not",
                self.base_url.as_str()
            )));
        }
        self.base_url
            .join(path)
            .map_err(|e| NalogError::Configuration(format!("invalid endpoint {path:?}: {e}")))
    }
}
