use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use query_engine_translation::translation::error::{translate, translate_encoding, ErrorEnvelope};
use query_engine_translation::translation::result;

/// Errors returned by the HTTP handlers.
#[derive(Debug)]
pub enum ServerError {
    /// The request body could not be understood.
    InvalidRequest(String),
    /// Running or encoding a statement failed.
    Query(ErrorEnvelope),
    /// The database could not be reached for a health check.
    Unavailable(ErrorEnvelope),
    NotFound,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::InvalidRequest(message) => {
                tracing::warn!("invalid request: {message}");
                let envelope = ErrorEnvelope::new(message, "invalid_request");
                (StatusCode::BAD_REQUEST, Json(envelope)).into_response()
            }
            ServerError::Query(envelope) => {
                tracing::warn!(code = %envelope.code, "query failed: {}", envelope.message);
                (StatusCode::BAD_REQUEST, Json(envelope)).into_response()
            }
            ServerError::Unavailable(envelope) => {
                tracing::error!(code = %envelope.code, "database unavailable: {}", envelope.message);
                (StatusCode::SERVICE_UNAVAILABLE, Json(envelope)).into_response()
            }
            ServerError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({"error": "Not found"}))).into_response()
            }
        }
    }
}

impl From<query_engine_execution::Error> for ServerError {
    fn from(value: query_engine_execution::Error) -> Self {
        ServerError::Query(translate(&value))
    }
}

impl From<sqlx::Error> for ServerError {
    fn from(value: sqlx::Error) -> Self {
        query_engine_execution::Error::from(value).into()
    }
}

impl From<result::Error> for ServerError {
    fn from(value: result::Error) -> Self {
        ServerError::Query(translate_encoding(&value))
    }
}
