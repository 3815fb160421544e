//! Client-side error types.

use serde::Deserialize;

/// Error returned by the REST request/response path.
///
/// Transport lifecycle failures on the realtime channel never surface here;
/// they are absorbed by the connection manager's reconnect policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Network(String),
    Http { status: u16, body: String },
    Deserialize(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Http { status, body } => match try_error_message(body) {
                Some(msg) => write!(f, "HTTP {}: {}", status, msg),
                None => write!(f, "HTTP {}: {}", status, body),
            },
            ApiError::Deserialize(msg) => write!(f, "Deserialization error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// Attempt to pull a user-facing `message` out of a backend error body.
/// The backend wraps errors in the same `{ data, status, message }` envelope
/// as successes, so a failed call usually carries a readable message.
pub fn try_error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }

    let parsed = serde_json::from_str::<ErrorBody>(body).ok()?;
    let message = parsed.message?;
    if message.trim().is_empty() {
        return None;
    }
    Some(message)
}
