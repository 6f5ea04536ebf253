//! Upstream failure taxonomy.

use thiserror::Error;

/// Longest upstream body excerpt carried in an error.
pub const BODY_EXCERPT_LIMIT: usize = 2048;

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The backend answered with a non-2xx status.
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend never produced a response (refused, DNS, timeout, reset).
    #[error("upstream unreachable: {0}")]
    Transport(String),

    /// The outbound request could not be built (bad URL, bad media type).
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),

    /// The backend answered 2xx with a body the bridge cannot use.
    #[error("unexpected upstream body: {0}")]
    InvalidBody(String),

    /// The staged upload could not be read back.
    #[error("failed to read staged upload: {0}")]
    Staging(#[from] std::io::Error),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Transport(format!("timed out: {err}"))
        } else if err.is_connect() {
            UpstreamError::Transport(format!("connection failed: {err}"))
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

/// Truncate a body to `BODY_EXCERPT_LIMIT` bytes on a char boundary.
pub fn excerpt(body: &str) -> String {
    if body.len() <= BODY_EXCERPT_LIMIT {
        return body.to_string();
    }
    let mut end = BODY_EXCERPT_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_short_body_untouched() {
        assert_eq!(excerpt("bad params"), "bad params");
    }

    #[test]
    fn test_excerpt_respects_char_boundary() {
        let body = "é".repeat(BODY_EXCERPT_LIMIT);
        let cut = excerpt(&body);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= BODY_EXCERPT_LIMIT + 3);
    }

    #[test]
    fn test_status_message_contains_body() {
        let err = UpstreamError::Status {
            status: 500,
            body: "bad params".into(),
        };
        assert_eq!(err.to_string(), "upstream returned 500: bad params");
    }
}
