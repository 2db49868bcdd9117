use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, TextEncoder};

use crate::state::ServerState;

/// Prometheus metrics in the text exposition format.
pub async fn get_metrics(State(state): State<ServerState>) -> Response {
    state.metrics.update_pool_metrics(&state.pool);

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    match encoder.encode(&state.metrics_registry.gather(), &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(error) => {
            tracing::error!("unable to encode metrics: {error}");
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
    }
}
