use thiserror::Error;

/// Message shown for any body that cannot be decoded.
pub const DECODING_MESSAGE: &str = "could not read response";

/// Errors returned by [`RemoteApi`](super::RemoteApi) implementations.
///
/// Every variant falls into one of three [`FailureKind`]s, which is all the
/// stores care about when deciding what to show and whether to roll back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Transport failure (DNS, connect, TLS, reset). Message is reported verbatim.
    #[error("{0}")]
    Network(String),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    /// Non-2xx response, or a 2xx envelope with `success: false`, carrying a
    /// server-supplied message
    #[error("{message}")]
    Server { status: u16, message: String },
    /// Non-2xx response without a readable message
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body was not the expected JSON shape
    #[error("Malformed response: {0}")]
    Decoding(String),
    /// Response body exceeded the size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Base URL failed validation
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Coarse classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Server,
    Decoding,
    /// The request task panicked. Never produced by an [`ApiError`].
    Internal,
}

impl ApiError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ApiError::Network(_) | ApiError::Timeout(_) | ApiError::InvalidBaseUrl(_) => {
                FailureKind::Network
            }
            ApiError::Server { .. } | ApiError::HttpStatus(_) => FailureKind::Server,
            ApiError::Decoding(_) | ApiError::ResponseTooLarge(_) => FailureKind::Decoding,
        }
    }

    /// Text placed in a store's `error` field.
    ///
    /// Network and server messages pass through unchanged; decoding problems
    /// collapse to a generic message since their detail is useless to a reader.
    pub fn user_message(&self) -> String {
        match self.kind() {
            FailureKind::Decoding => DECODING_MESSAGE.to_string(),
            FailureKind::Network | FailureKind::Server | FailureKind::Internal => {
                self.to_string()
            }
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } | ApiError::HttpStatus(status) => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(timeout_secs)
        } else if err.is_decode() {
            ApiError::Decoding(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decoding(err.to_string())
    }
}
