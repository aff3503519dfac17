use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tokio::sync::watch;

/// Opaque identifier of an operation, unique within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub(crate) u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "op-{}", self.0) }
}

/// Lifecycle of an operation.
///
/// `Queued → Dispatched → {Completed, Failed}`, with `Canceled` reachable from
/// `Queued` or `Dispatched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationState {
    Queued = 0,
    Dispatched = 1,
    Completed = 2,
    Canceled = 3,
    Failed = 4,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationState::Completed | OperationState::Canceled | OperationState::Failed
        )
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => OperationState::Queued,
            1 => OperationState::Dispatched,
            2 => OperationState::Completed,
            3 => OperationState::Canceled,
            _ => OperationState::Failed,
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationState::Queued => write!(f, "Queued"),
            OperationState::Dispatched => write!(f, "Dispatched"),
            OperationState::Completed => write!(f, "Completed"),
            OperationState::Canceled => write!(f, "Canceled"),
            OperationState::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug)]
struct Status {
    state:            AtomicU8,
    cancel_requested: AtomicBool,
}

/// Handle to a submitted request.
///
/// Cloning is cheap; all clones observe the same state. State transitions are
/// made by the owning session only.
#[derive(Debug, Clone)]
pub struct Operation {
    id:         OperationId,
    identifier: Arc<str>,
    status:     Arc<Status>,
}

impl Operation {
    pub(crate) fn new(id: OperationId, identifier: &str, state: OperationState) -> Self {
        Self {
            id,
            identifier: Arc::from(identifier),
            status: Arc::new(Status {
                state:            AtomicU8::new(state as u8),
                cancel_requested: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> OperationId { self.id }

    pub fn identifier(&self) -> &str { &self.identifier }

    pub fn state(&self) -> OperationState {
        OperationState::from_u8(self.status.state.load(Ordering::Acquire))
    }

    /// True once [`FetchSession::cancel`](crate::FetchSession::cancel) was called
    /// or the operation's [`CancelToken`] fired, even if the response won.
    pub fn cancel_requested(&self) -> bool { self.status.cancel_requested.load(Ordering::Acquire) }

    /// Whether both handles refer to the same submission.
    pub(crate) fn same_as(&self, other: &Operation) -> bool { Arc::ptr_eq(&self.status, &other.status) }

    pub(crate) fn set_state(&self, state: OperationState) {
        self.status.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn request_cancel(&self) {
        self.status.cancel_requested.store(true, Ordering::Release);
    }
}

/// Caller-side cancellation signal passed to
/// [`FetchSession::submit`](crate::FetchSession::submit).
///
/// Firing the token has the same effect as calling
/// [`FetchSession::cancel`](crate::FetchSession::cancel) on every operation it
/// was attached to.
///
/// ```
/// use trove_net::CancelToken;
///
/// let token = CancelToken::new();
/// let shared = token.clone();
/// shared.cancel();
/// assert!(token.is_canceled());
/// ```
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self { Self::new() }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) { self.tx.send_replace(true); }

    pub fn is_canceled(&self) -> bool { *self.tx.borrow() }

    /// Resolves once the token is canceled.
    pub async fn canceled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|canceled| *canceled).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_state_shared_between_clones() {
        let op = Operation::new(OperationId(7), "http://example.com", OperationState::Queued);
        let clone = op.clone();

        op.set_state(OperationState::Dispatched);
        assert_eq!(clone.state(), OperationState::Dispatched);
        assert!(!clone.state().is_terminal());

        op.request_cancel();
        op.set_state(OperationState::Canceled);
        assert!(clone.cancel_requested());
        assert!(clone.state().is_terminal());
        assert_eq!(clone.id().to_string(), "op-7");
    }

    #[tokio::test]
    async fn test_cancel_token_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.canceled().await })
        };

        tokio::task::yield_now().await;
        assert!(!token.is_canceled());
        token.cancel();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_token_already_canceled_resolves() {
        let token = CancelToken::new();
        token.cancel();
        token.canceled().await;
    }
}
