use crate::core::validation::is_success;
use crate::error::{FetchError, HttpErrorKind};

/// Longest body excerpt carried in an HTTP error message.
const MAX_MESSAGE_LEN: usize = 256;

/// Map a response status to a caller-visible error.
///
/// The message is the (truncated) response body when the server sent one,
/// and the canonical reason phrase otherwise.
///
/// ```
/// use trove_net::core::classify_status;
/// use trove_net::{FetchError, HttpErrorKind};
///
/// assert!(classify_status(200, b"").is_ok());
///
/// let err = classify_status(404, b"").unwrap_err();
/// assert!(matches!(err, FetchError::Http { kind: HttpErrorKind::NotFound, .. }));
/// ```
pub fn classify_status(status: u16, body: &[u8]) -> Result<(), FetchError> {
    if is_success(status) {
        return Ok(());
    }

    let kind = match status {
        400 | 500 => HttpErrorKind::Protocol,
        401 | 403 => HttpErrorKind::AuthenticationRequired,
        404 => HttpErrorKind::NotFound,
        409 | 412 => HttpErrorKind::Conflict,
        _ => HttpErrorKind::Unavailable,
    };

    Err(FetchError::Http {
        status,
        kind,
        message: error_message(status, body),
    })
}

fn error_message(status: u16, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return reason_phrase(status).to_string();
    }

    match text.char_indices().nth(MAX_MESSAGE_LEN) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        412 => "Precondition Failed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown Status",
    }
}
