//! Error types for trove-net.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure delivered to a completion callback.
///
/// Every variant is scoped to a single operation; nothing here affects the
/// throttle gate or the pending queue of other operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The identifier is not a fetchable resource locator. Rejected before
    /// any dispatch.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a non-success status.
    #[error("{kind} (HTTP {status}): {message}")]
    Http {
        status:  u16,
        kind:    HttpErrorKind,
        message: String,
    },

    #[error("operation was canceled")]
    Canceled,
}

impl FetchError {
    pub fn is_canceled(&self) -> bool { matches!(self, FetchError::Canceled) }

    /// Returns the HTTP status if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Classification of non-success HTTP statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpErrorKind {
    /// 400 and 500: the server rejected the request URI or headers.
    Protocol,
    /// 401 and 403.
    AuthenticationRequired,
    /// 404.
    NotFound,
    /// 409 and 412: the entry changed since it was downloaded.
    Conflict,
    /// Any other non-success status.
    Unavailable,
}

impl std::fmt::Display for HttpErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpErrorKind::Protocol => write!(f, "invalid request URI or header"),
            HttpErrorKind::AuthenticationRequired => write!(f, "authentication required"),
            HttpErrorKind::NotFound => write!(f, "resource not found"),
            HttpErrorKind::Conflict => write!(f, "entry modified since download"),
            HttpErrorKind::Unavailable => write!(f, "data not available"),
        }
    }
}

/// Failure reported by a [`Transport`](crate::Transport) before any HTTP
/// status was available.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind:    TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// DNS, connect, TLS or socket failure.
    Network,
    Timeout,
    /// The connection was established but the body could not be read.
    Unavailable,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportErrorKind::Network => write!(f, "cannot connect to the server"),
            TransportErrorKind::Timeout => write!(f, "request timed out"),
            TransportErrorKind::Unavailable => write!(f, "data not available"),
        }
    }
}

/// Cache insertion failure. Never surfaced to callers: the session logs it
/// and serves the response uncached.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("entry of {size} bytes exceeds cache budget of {budget} bytes")]
    EntryTooLarge { size: u64, budget: u64 },
}

/// Failure loading options, mock manifests or environment switches.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unsupported mock manifest version {0}")]
    UnsupportedVersion(i64),

    #[error("invalid ignored-parameters pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid token in {var}: {token:?}")]
    EnvToken { var: &'static str, token: String },
}

pub type Result<T> = std::result::Result<T, FetchError>;
