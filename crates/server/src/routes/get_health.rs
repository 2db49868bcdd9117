use axum::{extract::State, Json};
use serde_json::{json, Value};

use query_engine_execution::{execute, QueryRequest};
use query_engine_translation::translation::error::translate;

use crate::{error::ServerError, state::ServerState};

/// Check that the database answers `SELECT 1`.
pub async fn get_health(State(state): State<ServerState>) -> Result<Json<Value>, ServerError> {
    let checked = async {
        let mut connection = state.pool.acquire().await?;
        execute(&mut connection, &QueryRequest::new("SELECT 1")).await
    }
    .await;

    match checked {
        Ok(_) => Ok(Json(json!({"status": "ok"}))),
        Err(error) => Err(ServerError::Unavailable(translate(&error))),
    }
}
