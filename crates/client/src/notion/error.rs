//! Content API error types and their classification.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

/// Whether retrying a failed call can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The remote answered definitively (missing, forbidden, malformed request).
    Permanent,
    /// Timeouts, throttling, 5xx and transport failures.
    Transient,
}

/// Errors from the content API client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// No integration token configured.
    #[error("missing API token: PAGESYNC_API_TOKEN not set")]
    MissingToken,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Throttled by the remote; `retry_after` comes from the `Retry-After` header.
    #[error("rate limited: too many requests")]
    RateLimited { retry_after: Option<Duration> },

    /// Any other non-success status.
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response body did not match the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingToken | Self::NotFound(_) | Self::Unauthorized(_) | Self::Forbidden(_) | Self::BadRequest(_) => {
                ErrorClass::Permanent
            }
            Self::RateLimited { .. } | Self::Http { .. } | Self::Timeout | Self::Network(_) | Self::Parse(_) => {
                ErrorClass::Transient
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Errors that mean the record is gone or no longer visible to us.
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Forbidden(_) | Self::Unauthorized(_))
    }

    /// Minimum wait the remote asked for, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Map a non-success response to an error.
    pub fn from_status(status: u16, retry_after: Option<Duration>, body: &str) -> Self {
        let message = error_message(body);
        match status {
            400 => Self::BadRequest(message),
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            429 => Self::RateLimited { retry_after },
            _ => Self::Http { status, message },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else {
            ApiError::Network(Arc::new(err))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Extract `code: message` from an API error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { code: Some(code), message: Some(message) }) => format!("{code}: {message}"),
        Ok(ErrorBody { message: Some(message), .. }) => message,
        _ => body.chars().take(200).collect(),
    }
}
