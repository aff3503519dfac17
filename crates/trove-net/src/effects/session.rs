//! The fetch session: one lock around the throttle gate, the pending queue,
//! the cache and the table of live operations.
//!
//! Every state transition happens under [`Inner::state`]. Completion
//! callbacks are always invoked after the lock is released, so a callback may
//! submit or cancel on the same session.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::core::{
    CacheControl, CacheStats, PendingQueue, ResponseCache, ThrottleGate, cache_key, classify_status,
    validate_identifier,
};
use crate::data::{
    CancelToken, DEFAULT_CONTENT_TYPE, Operation, OperationId, OperationState, Request, Response,
    SessionOptions,
};
use crate::effects::capture::Capture;
use crate::effects::transport::{Transport, TransportRequest, TransportResponse};
use crate::error::{FetchError, Result, TransportError};

/// Longest body preview emitted at [`LogVerbosity::Body`](crate::LogVerbosity::Body).
const BODY_PREVIEW_LEN: usize = 512;

type Callback = Box<dyn FnOnce(Result<Response>) + Send + 'static>;

/// Bookkeeping for an operation that has not reached a terminal state.
///
/// Whoever removes the entry from the table owns `on_complete`, which is how
/// the callback fires exactly once.
struct Live {
    operation:   Operation,
    url:         String,
    headers:     Vec<(String, String)>,
    cache_key:   String,
    on_complete: Callback,
    /// Set once dispatched. Firing or dropping it drops the transport future.
    abort:       Option<oneshot::Sender<()>>,
    /// Dropped with the entry, which stops the cancel-token watcher.
    _release:    Option<oneshot::Sender<()>>,
}

struct State {
    options:  SessionOptions,
    gate:     ThrottleGate,
    queue:    PendingQueue,
    cache:    ResponseCache,
    live:     HashMap<OperationId, Live>,
    next_id:  u64,
    /// Deadline of the most recently armed drain timer.
    drain_at: Option<Instant>,
}

impl State {
    fn allocate_id(&mut self) -> OperationId {
        self.next_id += 1;
        OperationId(self.next_id)
    }

    fn remove_live(&mut self, id: OperationId) -> Option<Live> {
        let live = self.live.remove(&id)?;
        self.queue.remove(id);
        Some(live)
    }
}

struct Inner<T> {
    transport:         T,
    capture:           Option<Capture>,
    throttle_override: Option<Duration>,
    state:             Mutex<State>,
}

/// Rate-limited, cache-aware fetch front end over a [`Transport`].
///
/// Clones share the same session.
///
/// # Examples
///
/// ```no_run
/// # async fn demo() -> trove_net::Result<()> {
/// use std::time::Duration;
/// use trove_net::{FetchSession, ReqwestTransport, SessionOptions};
///
/// let transport = ReqwestTransport::new()?;
/// let options = SessionOptions::default()
///     .throttle_interval(Duration::from_secs(1))
///     .cache(true, 4 * 1024 * 1024);
/// let session = FetchSession::new(transport, options);
///
/// let response = session.fetch("https://musicbrainz.org/ws/2/artist?query=nirvana").await?;
/// println!("{} bytes of {}", response.len(), response.content_type);
/// # Ok(())
/// # }
/// ```
pub struct FetchSession<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for FetchSession<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder for sessions that need a capture directory or a forced throttle
/// interval.
pub struct SessionBuilder<T: Transport> {
    transport:         T,
    options:           SessionOptions,
    capture:           Option<Capture>,
    throttle_override: Option<Duration>,
}

impl<T: Transport> SessionBuilder<T> {
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Record every successful network response. Defaults to
    /// [`Capture::from_env`].
    #[must_use]
    pub fn capture(mut self, capture: Option<Capture>) -> Self {
        self.capture = capture;
        self
    }

    /// Use this interval regardless of what the options say, including after
    /// [`FetchSession::reconfigure`].
    #[must_use]
    pub fn throttle_override(mut self, interval: Option<Duration>) -> Self {
        self.throttle_override = interval;
        self
    }

    pub fn build(self) -> FetchSession<T> {
        let interval = self.throttle_override.unwrap_or(self.options.throttle_interval);
        let state = State {
            gate: ThrottleGate::new(interval),
            queue: PendingQueue::new(),
            cache: ResponseCache::new(self.options.cache_enabled, self.options.cache_budget_bytes),
            live: HashMap::new(),
            next_id: 0,
            drain_at: None,
            options: self.options,
        };

        FetchSession {
            inner: Arc::new(Inner {
                transport:         self.transport,
                capture:           self.capture,
                throttle_override: self.throttle_override,
                state:             Mutex::new(state),
            }),
        }
    }
}

impl<T: Transport> FetchSession<T> {
    pub fn new(transport: T, options: SessionOptions) -> Self {
        Self::builder(transport).options(options).build()
    }

    pub fn builder(transport: T) -> SessionBuilder<T> {
        SessionBuilder {
            transport,
            options: SessionOptions::default(),
            capture: Capture::from_env(),
            throttle_override: None,
        }
    }

    /// Submit a request. `on_complete` is invoked exactly once, from a tokio
    /// task or from [`cancel`](Self::cancel), never before this returns.
    ///
    /// A cache hit yields an operation that is already
    /// [`Completed`](OperationState::Completed); the callback still runs on a
    /// later scheduling turn.
    ///
    /// # Errors
    ///
    /// [`FetchError::InvalidRequest`] if the identifier is not an absolute
    /// `http`/`https` URL. The callback is dropped without being called.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn submit<F>(&self, request: impl Into<Request>, cancel: Option<CancelToken>, on_complete: F) -> Result<Operation>
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        let request = request.into();
        let url = validate_identifier(request.identifier())?;
        let key = cache_key(&url, request.headers());
        let on_complete: Callback = Box::new(on_complete);

        let mut state = self.inner.state.lock();
        let id = state.allocate_id();
        let verbosity = state.options.log_verbosity;

        if let Some(entry) = state.cache.lookup(&key) {
            let response = Response {
                status:       200,
                body:         entry.body.clone(),
                content_type: entry.content_type.clone(),
                headers:      Vec::new(),
                from_cache:   true,
            };
            drop(state);

            if verbosity.logs_requests() {
                debug!(%id, url = %url, bytes = response.len(), "served from cache");
            }
            let operation = Operation::new(id, url.as_str(), OperationState::Completed);
            tokio::spawn(async move { on_complete(Ok(response)) });
            return Ok(operation);
        }

        if cancel.as_ref().is_some_and(CancelToken::is_canceled) {
            drop(state);
            trace!(%id, "token fired before submit");
            let operation = Operation::new(id, url.as_str(), OperationState::Canceled);
            operation.request_cancel();
            tokio::spawn(async move { on_complete(Err(FetchError::Canceled)) });
            return Ok(operation);
        }

        let operation = Operation::new(id, url.as_str(), OperationState::Queued);
        let release = cancel.map(|token| self.inner.watch_token(operation.clone(), token));

        state.live.insert(id, Live {
            operation: operation.clone(),
            url: url.into(),
            headers: request.headers().to_vec(),
            cache_key: key,
            on_complete,
            abort: None,
            _release: release,
        });

        let now = Instant::now();
        if state.queue.is_empty() && state.gate.is_open(now) {
            self.inner.dispatch(&mut state, id, now);
        } else {
            state.queue.enqueue(id);
            if verbosity.logs_scheduling() {
                debug!(%id, position = state.queue.len(), "throttled, queued");
            }
            self.inner.arm_drain(&mut state, now);
        }

        Ok(operation)
    }

    /// Submit and wait for the outcome. Dropping the future cancels the
    /// operation.
    pub async fn fetch(&self, request: impl Into<Request>) -> Result<Response> {
        let (tx, rx) = oneshot::channel();
        let operation = self.submit(request, None, move |result| {
            let _ = tx.send(result);
        })?;

        let mut guard = CancelOnDrop {
            session:   self,
            operation: Some(operation),
        };
        let result = rx.await.unwrap_or(Err(FetchError::Canceled));
        guard.operation = None;
        result
    }

    /// Cancel an operation.
    ///
    /// A queued operation leaves the queue without touching the transport; a
    /// dispatched one has its exchange aborted. Either way the callback
    /// receives [`FetchError::Canceled`] before this returns. Terminal
    /// operations are left alone.
    pub fn cancel(&self, operation: &Operation) { self.inner.cancel(operation) }

    /// Replace the session options. The throttle gate, cache budget and
    /// verbosity take effect at the next gate check; nothing is dispatched
    /// from inside this call.
    pub fn reconfigure(&self, options: SessionOptions) {
        let mut state = self.inner.state.lock();

        let interval = self.inner.throttle_override.unwrap_or(options.throttle_interval);
        state.gate.set_interval(interval);
        state.cache.set_enabled(options.cache_enabled);
        state.cache.set_budget(options.cache_budget_bytes);
        if options.log_verbosity.logs_scheduling() {
            debug!(?interval, cache = options.cache_enabled, "session reconfigured");
        }
        state.options = options;

        // The gate may now open earlier than the armed timer.
        state.drain_at = None;
        self.inner.arm_drain(&mut state, Instant::now());
    }

    /// Cancel every queued operation and restart the throttle window from
    /// now. In-flight operations are unaffected. Returns how many were
    /// canceled.
    pub fn flush_pending(&self) -> usize {
        let mut state = self.inner.state.lock();
        let ids: Vec<_> = state.queue.drain().collect();
        let callbacks: Vec<_> = ids
            .into_iter()
            .filter_map(|id| state.live.remove(&id))
            .map(|live| {
                live.operation.request_cancel();
                live.operation.set_state(OperationState::Canceled);
                live.on_complete
            })
            .collect();
        state.gate.restart(Instant::now());
        state.drain_at = None;
        if state.options.log_verbosity.logs_scheduling() {
            debug!(canceled = callbacks.len(), "pending queue flushed");
        }
        drop(state);

        let count = callbacks.len();
        for callback in callbacks {
            callback(Err(FetchError::Canceled));
        }
        count
    }

    pub fn clear_cache(&self) { self.inner.state.lock().cache.clear() }

    pub fn cache_stats(&self) -> CacheStats { self.inner.state.lock().cache.stats() }

    /// Operations waiting for the throttle gate.
    pub fn pending_len(&self) -> usize { self.inner.state.lock().queue.len() }

    /// Operations handed to the transport and not yet finished.
    pub fn in_flight_len(&self) -> usize {
        let state = self.inner.state.lock();
        state.live.len() - state.queue.len()
    }

    pub fn options(&self) -> SessionOptions { self.inner.state.lock().options.clone() }

    pub fn transport(&self) -> &T { &self.inner.transport }
}

struct CancelOnDrop<'a, T: Transport> {
    session:   &'a FetchSession<T>,
    operation: Option<Operation>,
}

impl<T: Transport> Drop for CancelOnDrop<'_, T> {
    fn drop(&mut self) {
        if let Some(operation) = self.operation.take() {
            self.session.cancel(&operation);
        }
    }
}

impl<T: Transport> Inner<T> {
    /// Hand a live operation to the transport. Caller holds the lock and has
    /// checked the gate.
    fn dispatch(self: &Arc<Self>, state: &mut State, id: OperationId, now: Instant) {
        state.gate.mark_dispatched(now);

        let verbosity = state.options.log_verbosity;
        let headers = request_headers(&state.options, state.live.get(&id).map(|l| l.headers.as_slice()));
        let Some(live) = state.live.get_mut(&id) else {
            return;
        };

        let (abort_tx, abort_rx) = oneshot::channel::<()>();
        live.abort = Some(abort_tx);
        live.operation.set_state(OperationState::Dispatched);

        let request = TransportRequest {
            url: live.url.clone(),
            headers,
        };

        if verbosity.logs_requests() {
            debug!(%id, "GET {}", request.url);
        }
        if verbosity.logs_headers() {
            debug!(%id, headers = ?request.headers, "request headers");
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = tokio::select! {
                result = inner.transport.perform(&request) => result,
                _ = abort_rx => {
                    trace!(%id, "exchange aborted");
                    return;
                }
            };

            let Some((on_complete, outcome)) = inner.settle(id, result) else {
                return;
            };

            // Settled: a cancel from here on is a no-op.
            if let (Some(capture), Ok(response)) = (&inner.capture, &outcome) {
                if let Err(e) = capture.record(&request.url, &response.body).await {
                    debug!(%id, "capture failed: {e}");
                }
            }

            on_complete(outcome);
        });
    }

    /// Move a finished exchange to its terminal state and hand back the
    /// callback with its outcome, unless cancellation got there first.
    fn settle(
        &self,
        id: OperationId,
        result: std::result::Result<TransportResponse, TransportError>,
    ) -> Option<(Callback, Result<Response>)> {
        let mut state = self.state.lock();
        let Some(live) = state.remove_live(id) else {
            trace!(%id, "late response discarded");
            return None;
        };
        let verbosity = state.options.log_verbosity;

        let outcome = result.map_err(FetchError::from).and_then(|response| {
            if verbosity.logs_requests() {
                debug!(%id, status = response.status, bytes = response.body.len(), "response");
            }
            if verbosity.logs_headers() {
                debug!(%id, headers = ?response.headers, "response headers");
            }
            if verbosity.logs_body() {
                let cut = response.body.len().min(BODY_PREVIEW_LEN);
                debug!(%id, body = %String::from_utf8_lossy(&response.body[..cut]), "response body");
            }

            classify_status(response.status, &response.body)?;

            let content_type = response
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
            let cacheable = response
                .header("cache-control")
                .is_none_or(|value| CacheControl::parse(value).is_cacheable());

            if cacheable {
                match state
                    .cache
                    .insert(live.cache_key.clone(), response.body.clone(), content_type.clone(), Instant::now())
                {
                    Ok(stored) if stored && verbosity.logs_scheduling() => {
                        debug!(%id, key = %live.cache_key, "cached");
                    }
                    Ok(_) => {}
                    Err(e) => debug!(%id, "not cached: {e}"),
                }
            }

            Ok(Response {
                status: response.status,
                body: response.body,
                content_type,
                headers: response.headers,
                from_cache: false,
            })
        });

        let terminal = if outcome.is_ok() {
            OperationState::Completed
        } else {
            OperationState::Failed
        };
        live.operation.set_state(terminal);
        drop(state);

        if let Err(e) = &outcome {
            if verbosity.logs_requests() {
                debug!(%id, "failed: {e}");
            }
        }
        Some((live.on_complete, outcome))
    }

    fn cancel(&self, operation: &Operation) {
        let mut state = self.state.lock();
        let id = operation.id();

        let owned = state
            .live
            .get(&id)
            .is_some_and(|live| live.operation.same_as(operation));
        if !owned {
            return;
        }
        let Some(live) = state.remove_live(id) else {
            return;
        };

        let previous = live.operation.state();
        live.operation.request_cancel();
        live.operation.set_state(OperationState::Canceled);
        if let Some(abort) = live.abort {
            let _ = abort.send(());
        }
        if state.options.log_verbosity.logs_scheduling() {
            debug!(%id, from = %previous, "canceled");
        }
        drop(state);

        (live.on_complete)(Err(FetchError::Canceled));
    }

    /// Dispatch from the head of the queue while the gate is open, then arm
    /// the timer for whatever is left.
    fn pump(self: &Arc<Self>, state: &mut State) {
        let now = Instant::now();
        while state.gate.is_open(now) {
            let Some(id) = state.queue.dequeue() else {
                break;
            };
            self.dispatch(state, id, now);
        }
        self.arm_drain(state, now);
    }

    fn arm_drain(self: &Arc<Self>, state: &mut State, now: Instant) {
        if state.queue.is_empty() {
            return;
        }

        let deadline = state.gate.next_open_at(now);
        if state.drain_at.is_some_and(|armed| armed <= deadline) {
            return;
        }
        state.drain_at = Some(deadline);
        if state.options.log_verbosity.logs_scheduling() {
            trace!(wait = ?deadline.saturating_duration_since(now), "drain timer armed");
        }

        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = weak.upgrade() {
                inner.drain(deadline);
            }
        });
    }

    fn drain(self: &Arc<Self>, fired: Instant) {
        let mut state = self.state.lock();
        if state.drain_at == Some(fired) {
            state.drain_at = None;
        }
        self.pump(&mut state);
    }

    /// Cancel `operation` when `token` fires. The watcher ends when the
    /// returned sender is dropped.
    fn watch_token(self: &Arc<Self>, operation: Operation, token: CancelToken) -> oneshot::Sender<()> {
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let weak: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            tokio::select! {
                _ = token.canceled() => {
                    if let Some(inner) = weak.upgrade() {
                        inner.cancel(&operation);
                    }
                }
                _ = release_rx => {}
            }
        });

        release_tx
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        // In-flight tasks hold an `Arc`, so only queued operations remain.
        let state = self.state.get_mut();
        state.queue.drain().for_each(drop);
        for (_, live) in state.live.drain() {
            live.operation.request_cancel();
            live.operation.set_state(OperationState::Canceled);
            (live.on_complete)(Err(FetchError::Canceled));
        }
    }
}

/// Session defaults, then `User-Agent` unless one was given explicitly, then
/// the request's own headers.
fn request_headers(options: &SessionOptions, own: Option<&[(String, String)]>) -> Vec<(String, String)> {
    let own = own.unwrap_or_default();
    let has_agent = options
        .default_headers
        .iter()
        .chain(own)
        .any(|(key, _)| key.eq_ignore_ascii_case("user-agent"));

    let mut headers = options.default_headers.clone();
    if !has_agent && !options.user_agent.is_empty() {
        headers.push(("User-Agent".to_string(), options.user_agent.clone()));
    }
    headers.extend(own.iter().cloned());
    headers
}
