//! A [`Transport`] that answers from files on disk, for tests and offline
//! development.
//!
//! The manifest is TOML. The `default` table carries the format version and
//! an optional regex of query parameters to ignore when matching; every
//! other table is keyed by URL:
//!
//! ```toml
//! [default]
//! version = 1
//! ignored-parameters = "api_key=[^&]*"
//!
//! ["https://example.org/feed.xml"]
//! data = "feed.xml"
//! content-type = "application/rss+xml"
//! ```
//!
//! Data paths are resolved against the manifest's directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::effects::transport::{Transport, TransportRequest, TransportResponse};
use crate::error::{ConfigError, TransportError};

/// Environment variable enabling mocked sessions.
pub const MOCK_ENV: &str = "TROVE_NET_MOCKED";

/// Manifest looked up in the working directory when `config=` is absent.
pub const DEFAULT_MOCK_MANIFEST: &str = "mock-data.toml";

const MANIFEST_VERSION: i64 = 1;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Defaults {
    version:            i64,
    ignored_parameters: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Entry {
    data:         PathBuf,
    content_type: Option<String>,
    status:       Option<u16>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    default:   Defaults,
    #[serde(flatten)]
    resources: HashMap<String, Entry>,
}

/// Settings parsed from `TROVE_NET_MOCKED`.
///
/// The value is a flag followed by `:`-separated tokens, for example
/// `1:config=fixtures/mock.toml:throttle=0`. A flag of `0`, `no`, `off` or
/// `false` disables mocking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockEnv {
    pub config:   PathBuf,
    /// Replaces the session's throttle interval when set.
    pub throttle: Option<Duration>,
}

impl MockEnv {
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        match std::env::var(MOCK_ENV) {
            Ok(value) => Self::parse(&value),
            Err(_) => Ok(None),
        }
    }

    pub fn parse(value: &str) -> Result<Option<Self>, ConfigError> {
        let value = value.trim();
        if value.is_empty() || ["0", "no", "off", "false"].iter().any(|off| value.eq_ignore_ascii_case(off)) {
            return Ok(None);
        }

        let mut env = MockEnv {
            config:   PathBuf::from(DEFAULT_MOCK_MANIFEST),
            throttle: None,
        };

        for (index, token) in value.split(':').enumerate() {
            if let Some(path) = token.strip_prefix("config=") {
                env.config = PathBuf::from(path);
            } else if let Some(ms) = token.strip_prefix("throttle=") {
                let ms: u64 = ms.parse().map_err(|_| ConfigError::EnvToken {
                    var:   MOCK_ENV,
                    token: token.to_string(),
                })?;
                env.throttle = Some(Duration::from_millis(ms));
            } else if index > 0 {
                tracing::warn!("ignoring unknown {MOCK_ENV} token {token:?}");
            }
        }

        Ok(Some(env))
    }
}

/// Serves canned responses listed in a manifest.
///
/// URLs without an entry, and entries whose data file cannot be read, answer
/// with status 404.
#[derive(Debug)]
pub struct MockTransport {
    base:      PathBuf,
    ignored:   Option<Regex>,
    resources: HashMap<String, Entry>,
}

impl MockTransport {
    /// Load a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_toml(&source, base)
    }

    /// Parse a manifest whose data paths are relative to `base`.
    pub fn from_toml(source: &str, base: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let manifest: Manifest = toml::from_str(source)?;
        if manifest.default.version != MANIFEST_VERSION {
            return Err(ConfigError::UnsupportedVersion(manifest.default.version));
        }

        let ignored = manifest
            .default
            .ignored_parameters
            .as_deref()
            .filter(|pattern| !pattern.is_empty())
            .map(Regex::new)
            .transpose()?;

        Ok(Self {
            base: base.into(),
            ignored,
            resources: manifest.resources,
        })
    }

    /// Load the manifest named by `TROVE_NET_MOCKED`, if mocking is enabled.
    /// Returns the transport with the throttle override to hand to
    /// [`SessionBuilder::throttle_override`](crate::SessionBuilder::throttle_override).
    pub fn from_env() -> Result<Option<(Self, Option<Duration>)>, ConfigError> {
        let Some(env) = MockEnv::from_env()? else {
            return Ok(None);
        };
        let transport = Self::load(&env.config)?;
        Ok(Some((transport, env.throttle)))
    }

    pub fn len(&self) -> usize { self.resources.len() }

    pub fn is_empty(&self) -> bool { self.resources.is_empty() }

    /// The key a URL is looked up under once ignored parameters are removed.
    pub fn lookup_key(&self, url: &str) -> String {
        let Some(ignored) = &self.ignored else {
            return url.to_string();
        };
        let Ok(mut parsed) = Url::parse(url) else {
            return url.to_string();
        };

        let query = parsed.query().map(|query| {
            let stripped = ignored.replace_all(query, "");
            stripped
                .split('&')
                .filter(|pair| !pair.is_empty())
                .collect::<Vec<_>>()
                .join("&")
        });
        match query {
            Some(query) if !query.is_empty() => parsed.set_query(Some(&query)),
            _ => parsed.set_query(None),
        }
        parsed.to_string()
    }

    fn not_found(message: String) -> TransportResponse {
        TransportResponse {
            status:       404,
            body:         Bytes::from(message),
            content_type: Some("text/plain".to_string()),
            headers:      Vec::new(),
        }
    }
}

impl Transport for MockTransport {
    async fn perform(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let key = self.lookup_key(&request.url);
        let Some(entry) = self.resources.get(&key) else {
            return Ok(Self::not_found(format!("no mock content for {key}")));
        };

        let path = self.base.join(&entry.data);
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) => return Ok(Self::not_found(format!("cannot read {}: {e}", path.display()))),
        };

        Ok(TransportResponse {
            status:       entry.status.unwrap_or(200),
            body:         Bytes::from(body),
            content_type: entry.content_type.clone(),
            headers:      Vec::new(),
        })
    }
}
