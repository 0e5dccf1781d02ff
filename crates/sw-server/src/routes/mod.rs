//! Route handlers for the HTTP API.

pub mod health;
pub mod history;
pub mod probe;
pub mod streams;
pub mod tools;

use axum::body::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Generic `{status, message}` body returned by control operations.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ActionResponse {
    /// `"ok"` or `"error"`.
    pub status: String,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".into(),
            message: message.into(),
        }
    }
}

/// Parse an optional JSON request body. An empty body yields the default
/// value so that a missing field is reported by the handler rather than as
/// a body rejection.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> sw_core::Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| sw_core::Error::Validation(format!("invalid JSON body: {e}")))
}
