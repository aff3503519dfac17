//! Shared test transport.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use trove_net::{Response, Result, Transport, TransportError, TransportRequest, TransportResponse};

/// One call observed by [`TestTransport`].
#[derive(Debug, Clone)]
pub struct Call {
    pub url:     String,
    pub headers: Vec<(String, String)>,
    pub at:      Instant,
}

#[derive(Debug, Clone)]
enum Route {
    Respond(TransportResponse),
    Fail(TransportError),
}

#[derive(Debug, Default)]
struct Script {
    calls:    Mutex<Vec<Call>>,
    routes:   Mutex<HashMap<String, Route>>,
    finished: AtomicUsize,
}

/// Transport that records every call and answers from a route table.
///
/// Unrouted URLs answer 200 with the URL as body.
#[derive(Debug, Clone, Default)]
pub struct TestTransport {
    script: Arc<Script>,
    delay:  Duration,
}

impl TestTransport {
    pub fn new() -> Self { Self::default() }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            script: Arc::default(),
            delay,
        }
    }

    pub fn respond(&self, url: &str, response: TransportResponse) {
        self.script
            .routes
            .lock()
            .insert(url.to_string(), Route::Respond(response));
    }

    pub fn respond_body(&self, url: &str, body: &'static [u8]) {
        self.respond(url, TransportResponse::ok(Bytes::from_static(body), "text/plain"));
    }

    pub fn respond_status(&self, url: &str, status: u16, body: &'static str) {
        let mut response = TransportResponse::ok(body, "text/plain");
        response.status = status;
        self.respond(url, response);
    }

    pub fn fail(&self, url: &str, error: TransportError) {
        self.script
            .routes
            .lock()
            .insert(url.to_string(), Route::Fail(error));
    }

    pub fn calls(&self) -> Vec<Call> { self.script.calls.lock().clone() }

    pub fn call_count(&self) -> usize { self.script.calls.lock().len() }

    pub fn urls(&self) -> Vec<String> { self.calls().into_iter().map(|c| c.url).collect() }

    /// Calls whose future ran to completion rather than being dropped.
    pub fn finished(&self) -> usize { self.script.finished.load(Ordering::SeqCst) }
}

impl Transport for TestTransport {
    async fn perform(&self, request: &TransportRequest) -> std::result::Result<TransportResponse, TransportError> {
        self.script.calls.lock().push(Call {
            url:     request.url.clone(),
            headers: request.headers.clone(),
            at:      Instant::now(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let route = self.script.routes.lock().get(&request.url).cloned();
        self.script.finished.fetch_add(1, Ordering::SeqCst);

        match route {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Fail(error)) => Err(error),
            None => Ok(TransportResponse::ok(request.url.clone(), "text/plain")),
        }
    }
}

/// Channel-backed completion callback tagged with a label.
pub type Outcomes = mpsc::UnboundedReceiver<(String, Result<Response>)>;

pub fn outcomes() -> (mpsc::UnboundedSender<(String, Result<Response>)>, Outcomes) { mpsc::unbounded_channel() }

pub fn reporter(
    tx: &mpsc::UnboundedSender<(String, Result<Response>)>,
    label: &str,
) -> impl FnOnce(Result<Response>) + Send + 'static {
    let tx = tx.clone();
    let label = label.to_string();
    move |result| {
        let _ = tx.send((label, result));
    }
}

pub fn url(path: &str) -> String { format!("http://example.com/{path}") }
