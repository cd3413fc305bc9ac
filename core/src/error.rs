//! Error types for the API client.
//!
//! # Design
//! Failures are split by what the caller can do about them. Configuration
//! errors are fatal. Transport failures, timeouts, rate limits and 5xx
//! responses are transient. Every other 4xx is final. `NotFound` gets a
//! dedicated variant because callers frequently distinguish "the resource
//! does not exist" from other client errors.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while assembling a client or a route.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API version {0} is too new to be used")]
    VersionTooNew(u64),

    #[error("API version {0} is discontinued, use a newer version")]
    VersionDiscontinued(u64),

    #[error("invalid value {value:?} for environment variable {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid API base URL {0:?}")]
    InvalidBaseUrl(String),

    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("failed to build HTTP session: {0}")]
    Http(#[source] reqwest::Error),
}

/// The JSON error object the platform returns alongside 4xx/5xx statuses.
///
/// Parsed best-effort: a body that is not JSON leaves both fields empty and
/// the raw text is kept on the error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(skip)]
    pub raw: String,
}

impl ErrorBody {
    pub fn parse(raw: &str) -> Self {
        let mut body: ErrorBody = serde_json::from_str(raw).unwrap_or_default();
        body.raw = raw.to_string();
        body
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, self.code) {
            (Some(message), Some(code)) => write!(f, "{message} (code {code})"),
            (Some(message), None) => f.write_str(message),
            _ => f.write_str(&self.raw),
        }
    }
}

/// Coarse classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Transport,
    Timeout,
    RateLimited,
    ClientError,
    ServerError,
    Decode,
    Encode,
    InvalidArgument,
}

/// Errors returned by `HttpClient` and the model factories.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Connection, DNS or TLS failure before a response arrived.
    #[error("transport failure: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("request timed out")]
    Timeout,

    /// The server returned 429.
    #[error("rate limited, retry after {retry_after:?} (global: {global})")]
    RateLimited {
        retry_after: Duration,
        global: bool,
        body: ErrorBody,
    },

    /// The server returned 404.
    #[error("resource not found: {body}")]
    NotFound { body: ErrorBody },

    /// Any other 4xx status.
    #[error("HTTP {status}: {body}")]
    Client { status: u16, body: ErrorBody },

    /// A 5xx status.
    #[error("server error HTTP {status}: {body}")]
    Server { status: u16, body: ErrorBody },

    /// The response body could not be decoded into the expected shape.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The request payload could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Config(_) => ErrorKind::Config,
            ApiError::Transport { .. } => ErrorKind::Transport,
            ApiError::Timeout => ErrorKind::Timeout,
            ApiError::RateLimited { .. } => ErrorKind::RateLimited,
            ApiError::NotFound { .. } | ApiError::Client { .. } => ErrorKind::ClientError,
            ApiError::Server { .. } => ErrorKind::ServerError,
            ApiError::Decode(_) => ErrorKind::Decode,
            ApiError::Encode(_) => ErrorKind::Encode,
            ApiError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    /// Returns true if repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transport
                | ErrorKind::Timeout
                | ErrorKind::RateLimited
                | ErrorKind::ServerError
        )
    }

    /// The HTTP status that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RateLimited { .. } => Some(429),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Client { status, .. } | ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ApiError::Timeout;
        }
        let message = if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            format!("request failed: {err}")
        };
        ApiError::Transport {
            message,
            source: Some(err),
        }
    }

    pub(crate) fn decode(err: impl fmt::Display) -> Self {
        ApiError::Decode(err.to_string())
    }
}
