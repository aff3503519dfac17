use url::Url;

use crate::error::FetchError;

/// Parse a request identifier into a fetchable URL.
///
/// Only absolute `http` and `https` URLs with a host are accepted.
///
/// # Examples
///
/// ```
/// use trove_net::core::validate_identifier;
///
/// assert!(validate_identifier("https://example.org/feed.xml").is_ok());
/// assert!(validate_identifier("not a url").is_err());
/// assert!(validate_identifier("ftp://example.org/file").is_err());
/// ```
pub fn validate_identifier(identifier: &str) -> Result<Url, FetchError> {
    let url = Url::parse(identifier.trim())
        .map_err(|e| FetchError::InvalidRequest(format!("malformed URL {identifier:?}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidRequest(format!(
            "unsupported scheme {:?} in {identifier:?}",
            url.scheme()
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(FetchError::InvalidRequest(format!("missing host in {identifier:?}")));
    }

    Ok(url)
}

/// Cache key for a request: the normalized URL followed by any per-request
/// headers, sorted so header order does not matter.
///
/// Only the fragment is dropped; `Url` already omits a default port, so
/// `http://a.org:80/x` and `http://a.org/x` share one entry while `/x/` and
/// `/x` stay distinct resources.
pub fn cache_key(url: &Url, headers: &[(String, String)]) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let mut key = normalized.to_string();
    if !headers.is_empty() {
        let mut sorted: Vec<_> = headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
            .collect();
        sorted.sort();
        for (name, value) in sorted {
            key.push('\n');
            key.push_str(&name);
            key.push_str(": ");
            key.push_str(value);
        }
    }
    key
}

/// Returns `true` for 2xx statuses.
pub fn is_success(status: u16) -> bool { (200..300).contains(&status) }
