use std::future::Future;

use bytes::Bytes;

use crate::error::TransportError;

/// A request handed to the transport once the throttle gate let it through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Validated absolute URL.
    pub url:     String,
    /// Session defaults, `User-Agent` and per-request headers, in send order.
    pub headers: Vec<(String, String)>,
}

/// Raw outcome of an exchange. Status classification happens in the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status:       u16,
    pub body:         Bytes,
    pub content_type: Option<String>,
    pub headers:      Vec<(String, String)>,
}

impl TransportResponse {
    pub fn ok(body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            status:       200,
            body:         body.into(),
            content_type: Some(content_type.into()),
            headers:      Vec::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Asynchronous transport abstraction.
///
/// This is the minimal interface the session needs: perform one GET and
/// return the whole body. Implementations handle their own redirects,
/// timeouts and connection pooling.
///
/// # Cancellation
///
/// The session aborts a dispatched request by dropping the returned future.
/// Implementations must release the connection when that happens, which is
/// what `reqwest` does.
///
/// # Implementations
///
/// - [`ReqwestTransport`]: production implementation using `reqwest`
/// - [`MockTransport`](crate::MockTransport): serves canned files
pub trait Transport: Send + Sync + 'static {
    fn perform(
        &self,
        request: &TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::time::Duration;

    use super::*;
    use crate::error::TransportErrorKind;

    /// Production transport using reqwest.
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// Create a transport with reqwest's default configuration.
        pub fn new() -> Result<Self, TransportError> { Self::build(reqwest::Client::builder()) }

        /// Create a transport whose requests fail with
        /// [`TransportErrorKind::Timeout`] after `timeout`.
        pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
            Self::build(reqwest::Client::builder().timeout(timeout))
        }

        /// Wrap an already configured client.
        pub fn from_client(client: reqwest::Client) -> Self { Self { client } }

        fn build(builder: reqwest::ClientBuilder) -> Result<Self, TransportError> {
            let client = builder.build().map_err(map_error)?;
            Ok(Self { client })
        }
    }

    fn map_error(e: reqwest::Error) -> TransportError {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_body() || e.is_decode() {
            TransportErrorKind::Unavailable
        } else {
            TransportErrorKind::Network
        };
        TransportError::new(kind, e.to_string())
    }

    impl Transport for ReqwestTransport {
        async fn perform(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
            let mut builder = self.client.get(&request.url);

            for (key, value) in &request.headers {
                builder = builder.header(key, value);
            }

            let response = builder.send().await.map_err(map_error)?;

            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();

            let body = response.bytes().await.map_err(map_error)?;

            Ok(TransportResponse {
                status,
                body,
                content_type,
                headers,
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestTransport;
