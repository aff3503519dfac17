//! Pure scheduling and caching logic.
//!
//! Everything here is synchronous and takes the current instant as an
//! argument; the session in `effects` owns the clock and the lock.

mod cache;
mod queue;
mod status;
mod throttle;
mod validation;

pub use cache::{CacheControl, CacheEntry, CacheStats, ResponseCache};
pub use queue::PendingQueue;
pub use status::{classify_status, reason_phrase};
pub use throttle::ThrottleGate;
pub use validation::{cache_key, is_success, validate_identifier};
