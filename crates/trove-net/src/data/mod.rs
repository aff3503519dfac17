//! Immutable data types for the fetch session.
//!
//! Configuration, request/response values and the shared operation handle.
//! Nothing in here performs I/O.

pub mod operation;
pub mod options;
pub mod request;

pub use operation::{CancelToken, Operation, OperationId, OperationState};
pub use options::{DEFAULT_CACHE_BUDGET, LogVerbosity, SessionOptions};
pub use request::{DEFAULT_CONTENT_TYPE, Request, Response};
