use bytes::Bytes;

/// Content type reported when the server does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A resource to fetch, with optional extra request headers.
///
/// ```
/// use trove_net::Request;
///
/// let request = Request::new("https://example.org/cover.jpg").header("Accept", "image/*");
/// assert_eq!(request.identifier(), "https://example.org/cover.jpg");
/// assert_eq!(request.headers().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    identifier: String,
    headers:    Vec<(String, String)>,
}

impl Request {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            headers:    Vec::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn identifier(&self) -> &str { &self.identifier }

    pub fn headers(&self) -> &[(String, String)] { &self.headers }
}

impl From<&str> for Request {
    fn from(identifier: &str) -> Self { Self::new(identifier) }
}

impl From<String> for Request {
    fn from(identifier: String) -> Self { Self::new(identifier) }
}

impl From<&String> for Request {
    fn from(identifier: &String) -> Self { Self::new(identifier.as_str()) }
}

/// A successfully fetched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status:       u16,
    pub body:         Bytes,
    pub content_type: String,
    /// Response headers as reported by the transport. Empty for cache hits.
    pub headers:      Vec<(String, String)>,
    /// True when served from the session cache without a dispatch.
    pub from_cache:   bool,
}

impl Response {
    pub fn len(&self) -> usize { self.body.len() }

    pub fn is_empty(&self) -> bool { self.body.is_empty() }

    /// Body as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String { String::from_utf8_lossy(&self.body).into_owned() }

    /// First value of a response header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
