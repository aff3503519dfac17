//! Effectful half of the crate: the transports, capture to disk and the
//! session that owns tasks, timers and the lock.

mod capture;
mod mock;
mod session;
mod transport;

pub use capture::{CAPTURE_DIR_ENV, CAPTURE_MANIFEST, Capture};
pub use mock::{DEFAULT_MOCK_MANIFEST, MOCK_ENV, MockEnv, MockTransport};
pub use session::{FetchSession, SessionBuilder};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{Transport, TransportRequest, TransportResponse};
