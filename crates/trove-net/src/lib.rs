//! Rate-limited, cache-aware HTTP fetching for metadata backends.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable configuration, request and operation types
//! - [`core`] - Pure scheduling logic: throttle gate, pending queue, cache
//! - `effects` - Transports and the [`FetchSession`] that drives them
//!
//! # Key Features
//!
//! - **Throttled**: at most one dispatch per configured interval, excess
//!   requests wait in FIFO order
//! - **Cached**: successful bodies are kept in a byte-budgeted LRU cache
//! - **Cancelable**: queued requests never reach the network, in-flight
//!   ones are aborted, and the completion callback fires exactly once
//! - **Replayable**: [`Capture`] records responses that [`MockTransport`]
//!   can serve back

pub mod core;
pub mod data;
mod effects;
mod error;

pub use data::{
    CancelToken, DEFAULT_CACHE_BUDGET, DEFAULT_CONTENT_TYPE, LogVerbosity, Operation, OperationId,
    OperationState, Request, Response, SessionOptions,
};
#[cfg(feature = "reqwest")]
pub use effects::ReqwestTransport;
pub use effects::{
    CAPTURE_DIR_ENV, CAPTURE_MANIFEST, Capture, DEFAULT_MOCK_MANIFEST, FetchSession, MOCK_ENV, MockEnv,
    MockTransport, SessionBuilder, Transport, TransportRequest, TransportResponse,
};
pub use error::{
    CacheError, ConfigError, FetchError, HttpErrorKind, Result, TransportError, TransportErrorKind,
};
