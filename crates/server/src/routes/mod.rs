mod cors;
mod get_health;
mod get_metrics;
mod get_v2;
mod post_sql;

use crate::error::ServerError;
use crate::state::ServerState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub use cors::cors;
pub use get_health::get_health;
pub use get_metrics::get_metrics;
pub use get_v2::get_v2;
pub use post_sql::{post_sql, SqlRequest, Statement};

pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/sql", post(post_sql).fallback(not_found))
        .route("/v2", get(get_v2).fallback(not_found))
        .route("/health", get(get_health).fallback(not_found))
        .route("/metrics", get(get_metrics).fallback(not_found))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Any path or method we do not serve.
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
