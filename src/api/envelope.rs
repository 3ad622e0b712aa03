//! Response envelope decoding.
//!
//! The server wraps every body as
//! `{"success": bool, "data": T|null, "error": ..., "pagination": {...}|null}`.
//! Bodies that are not envelopes are decoded as a bare `T`.
use super::ApiError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<ErrorField>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

/// Error payload: a plain string or `{"message": "..."}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Text(String),
    Object { message: String },
}

impl ErrorField {
    fn into_message(self) -> String {
        match self {
            ErrorField::Text(message) | ErrorField::Object { message } => message,
        }
    }
}

/// Pagination block attached to list responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_pages: u64,
    pub has_more: bool,
}

fn is_envelope(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("success") || obj.contains_key("data"))
}

/// Decode a 2xx body into its payload and optional pagination.
pub(crate) fn decode_data<T: DeserializeOwned>(
    status: u16,
    body: &[u8],
) -> Result<(T, Option<Pagination>), ApiError> {
    let value: Value = serde_json::from_slice(body)?;

    if !is_envelope(&value) {
        return Ok((serde_json::from_value(value)?, None));
    }

    let envelope: Envelope = serde_json::from_value(value)?;
    if envelope.success == Some(false) {
        return Err(server_failure(status, envelope.error));
    }
    match envelope.data {
        Some(data) if !data.is_null() => Ok((serde_json::from_value(data)?, envelope.pagination)),
        _ => match envelope.error {
            Some(error) => Err(ApiError::Server {
                status,
                message: error.into_message(),
            }),
            None => Err(ApiError::Decoding("envelope has no data".to_string())),
        },
    }
}

/// Decode a 2xx body of an action endpoint whose payload is ignored.
///
/// Empty bodies (204) are success. An envelope is only a failure when it
/// explicitly says `success: false`.
pub(crate) fn decode_ack(status: u16, body: &[u8]) -> Result<(), ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }
    let value: Value = serde_json::from_slice(body)?;
    if !is_envelope(&value) {
        return Ok(());
    }
    let envelope: Envelope = serde_json::from_value(value)?;
    if envelope.success == Some(false) {
        return Err(server_failure(status, envelope.error));
    }
    Ok(())
}

/// Build the error for a non-2xx response, using the envelope message if present.
pub(crate) fn decode_failure(status: u16, body: &[u8]) -> ApiError {
    match serde_json::from_slice::<Envelope>(body) {
        Ok(Envelope {
            error: Some(error), ..
        }) => ApiError::Server {
            status,
            message: error.into_message(),
        },
        _ => ApiError::HttpStatus(status),
    }
}

fn server_failure(status: u16, error: Option<ErrorField>) -> ApiError {
    ApiError::Server {
        status,
        message: error
            .map(ErrorField::into_message)
            .unwrap_or_else(|| "Request failed".to_string()),
    }
}
