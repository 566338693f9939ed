use serde::Deserialize;
use thiserror::Error;

/// Failures talking to the barbook API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The sessions endpoint rejected the credentials (401).
    #[error("credentials were rejected")]
    Unauthorized,

    /// The API asked us to back off (429).
    #[error("rate limited - wait before retrying")]
    RateLimited,

    /// The API itself is failing (5xx).
    #[error("service unavailable ({status}): {detail}")]
    Unavailable { status: u16, detail: String },

    /// A status the sessions protocol has no meaning for.
    #[error("unexpected status {status}: {detail}")]
    Unexpected { status: u16, detail: String },

    /// The endpoint could not be reached at the transport level.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A success status carrying a body we could not make sense of.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Classify a non-success response from the API.
    pub(crate) fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        match status {
            reqwest::StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            reqwest::StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
            s if s.is_server_error() => ApiError::Unavailable {
                status: s.as_u16(),
                detail: detail_snippet(body),
            },
            s => ApiError::Unexpected {
                status: s.as_u16(),
                detail: detail_snippet(body),
            },
        }
    }
}

/// Error envelope the API wraps negative responses in
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Longest detail snippet worth carrying into logs and error chains
const MAX_DETAIL_BYTES: usize = 200;

/// Pull a short, human-readable detail out of an error body: the API's
/// JSON `message` field when present, otherwise the first line of the
/// body. Clamped to a character boundary so localized bodies cannot be
/// split mid-codepoint.
fn detail_snippet(body: &str) -> String {
    let line = match serde_json::from_str::<ErrorBody>(body) {
        Ok(envelope) => envelope.message,
        Err(_) => body.lines().next().unwrap_or("").trim().to_string(),
    };

    if line.len() <= MAX_DETAIL_BYTES {
        return line;
    }
    let mut end = MAX_DETAIL_BYTES;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes omitted)", &line[..end], line.len() - end)
}
