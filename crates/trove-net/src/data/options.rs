use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default cache budget: 10 MiB.
pub const DEFAULT_CACHE_BUDGET: u64 = 10 * 1024 * 1024;

/// How much of each exchange the session reports through `tracing`.
///
/// Levels are cumulative: `Headers` also logs what `Minimal` logs, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogVerbosity {
    /// Nothing per request.
    #[default]
    None,

    /// Request line and response status.
    Minimal,

    /// Request and response headers.
    Headers,

    /// A bounded preview of the response body.
    Body,

    /// Everything above plus queueing and cache decisions.
    Full,
}

impl LogVerbosity {
    pub fn logs_requests(self) -> bool { self >= LogVerbosity::Minimal }

    pub fn logs_headers(self) -> bool { self >= LogVerbosity::Headers }

    pub fn logs_body(self) -> bool { self >= LogVerbosity::Body }

    pub fn logs_scheduling(self) -> bool { self >= LogVerbosity::Full }
}

impl fmt::Display for LogVerbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogVerbosity::None => write!(f, "none"),
            LogVerbosity::Minimal => write!(f, "minimal"),
            LogVerbosity::Headers => write!(f, "headers"),
            LogVerbosity::Body => write!(f, "body"),
            LogVerbosity::Full => write!(f, "full"),
        }
    }
}

/// Configuration of a [`FetchSession`](crate::FetchSession).
///
/// Options are plain values: build them before creating the session and hand
/// a new copy to [`FetchSession::reconfigure`](crate::FetchSession::reconfigure)
/// to change them later.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use trove_net::{LogVerbosity, SessionOptions};
///
/// let options = SessionOptions::default()
///     .user_agent("my-backend/1.0")
///     .throttle_interval(Duration::from_secs(1))
///     .cache(true, 4 * 1024 * 1024)
///     .log_verbosity(LogVerbosity::Minimal);
///
/// assert!(options.cache_enabled);
/// assert_eq!(options.throttle_interval, Duration::from_secs(1));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionOptions {
    /// Value of the `User-Agent` header sent with every request.
    ///
    /// Default: `trove-net/<version>`
    pub user_agent: String,

    /// Default: [`LogVerbosity::None`]
    pub log_verbosity: LogVerbosity,

    /// Whether successful responses are stored and served from memory.
    ///
    /// Default: false
    pub cache_enabled: bool,

    /// Upper bound on the summed body size of cached responses.
    ///
    /// Default: 10 MiB
    pub cache_budget_bytes: u64,

    /// Minimum time between two dispatches. Zero disables throttling.
    ///
    /// Serialized as whole milliseconds under `throttle-interval-ms`.
    ///
    /// Default: zero
    #[serde(rename = "throttle-interval-ms", with = "duration_ms")]
    pub throttle_interval: Duration,

    /// Headers added to every request before per-request headers.
    ///
    /// Default: empty
    pub default_headers: Vec<(String, String)>,
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("user_agent", &self.user_agent)
            .field("log_verbosity", &self.log_verbosity)
            .field("cache_enabled", &self.cache_enabled)
            .field("cache_budget_bytes", &self.cache_budget_bytes)
            .field("throttle_interval", &self.throttle_interval)
            .field("default_headers", &self.default_headers.len())
            .finish()
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            user_agent: concat!("trove-net/", env!("CARGO_PKG_VERSION")).to_string(),
            log_verbosity: LogVerbosity::None,
            cache_enabled: false,
            cache_budget_bytes: DEFAULT_CACHE_BUDGET,
            throttle_interval: Duration::ZERO,
            default_headers: Vec::new(),
        }
    }
}

impl SessionOptions {
    /// Parse options from a TOML document. Missing keys keep their defaults.
    ///
    /// ```
    /// use std::time::Duration;
    /// use trove_net::SessionOptions;
    ///
    /// let options = SessionOptions::from_toml(r#"
    ///     user-agent = "thumbs/2"
    ///     cache-enabled = true
    ///     throttle-interval-ms = 1500
    /// "#).unwrap();
    ///
    /// assert_eq!(options.user_agent, "thumbs/2");
    /// assert_eq!(options.throttle_interval, Duration::from_millis(1500));
    /// ```
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> { Ok(toml::from_str(source)?) }

    /// Read and parse a TOML options file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&source)
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn log_verbosity(mut self, log_verbosity: LogVerbosity) -> Self {
        self.log_verbosity = log_verbosity;
        self
    }

    /// Enable or disable the response cache and set its byte budget.
    #[must_use]
    pub fn cache(mut self, enabled: bool, budget_bytes: u64) -> Self {
        self.cache_enabled = enabled;
        self.cache_budget_bytes = budget_bytes;
        self
    }

    #[must_use]
    pub fn throttle_interval(mut self, interval: Duration) -> Self {
        self.throttle_interval = interval;
        self
    }

    /// Add a header sent with every request.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((key.into(), value.into()));
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
