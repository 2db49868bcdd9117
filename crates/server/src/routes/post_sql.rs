use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};

use query_engine_execution::{execute, QueryRequest};
use query_engine_translation::translation::result::{encode, ResultEnvelope};

use crate::{error::ServerError, state::ServerState};

/// One statement in a request body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Statement {
    pub query: String,
    #[serde(default)]
    pub params: Option<Vec<serde_json::Value>>,
}

impl From<Statement> for QueryRequest {
    fn from(statement: Statement) -> QueryRequest {
        QueryRequest::new(statement.query).with_params(statement.params.unwrap_or_default())
    }
}

/// A single statement, or a batch that runs in one transaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SqlRequest {
    Batch { queries: Vec<Statement> },
    Single(Statement),
}

#[derive(Debug, Clone, Serialize)]
struct BatchResponse {
    results: Vec<ResultEnvelope>,
}

/// Run the statement(s) in the body and return their results.
///
/// The body is parsed by hand so that malformed input gets the same error
/// envelope as a failing statement, whatever its content type.
pub async fn post_sql(
    State(state): State<ServerState>,
    body: Bytes,
) -> Result<Response, ServerError> {
    let request: SqlRequest = serde_json::from_slice(&body)
        .map_err(|error| ServerError::InvalidRequest(format!("Invalid request body: {error}")))?;

    let result = match request {
        SqlRequest::Single(statement) => run_statement(&state, statement.into())
            .await
            .map(|envelope| Json(envelope).into_response()),
        SqlRequest::Batch { queries } => run_batch(&state, queries)
            .await
            .map(|results| Json(BatchResponse { results }).into_response()),
    };
    state.metrics.record_query(&result);
    result
}

async fn run_statement(
    state: &ServerState,
    request: QueryRequest,
) -> Result<ResultEnvelope, ServerError> {
    let mut connection = state.pool.acquire().await?;
    let output = execute(&mut connection, &request)
        .instrument(info_span!("Execute query"))
        .await?;
    let envelope = async { encode(&output) }
        .instrument(info_span!("Encode result"))
        .await?;
    Ok(envelope)
}

async fn run_batch(
    state: &ServerState,
    statements: Vec<Statement>,
) -> Result<Vec<ResultEnvelope>, ServerError> {
    let mut transaction = state.pool.begin().await?;
    let mut results = Vec::with_capacity(statements.len());
    for (index, statement) in statements.into_iter().enumerate() {
        let request = QueryRequest::from(statement);
        let executed = execute(&mut transaction, &request)
            .instrument(info_span!("Execute batch query", index))
            .await
            .map_err(ServerError::from)
            .and_then(|output| encode(&output).map_err(ServerError::from));
        match executed {
            Ok(envelope) => results.push(envelope),
            Err(error) => {
                if let Err(rollback_error) = transaction.rollback().await {
                    tracing::warn!("error rolling back batch: {rollback_error}");
                }
                return Err(error);
            }
        }
    }
    transaction.commit().await?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_statements_parse() {
        let request: SqlRequest =
            serde_json::from_value(json!({"query": "SELECT $1", "params": [1]})).unwrap();
        assert_eq!(
            request,
            SqlRequest::Single(Statement {
                query: "SELECT $1".to_string(),
                params: Some(vec![json!(1)]),
            })
        );
    }

    #[test]
    fn params_are_optional() {
        let request: SqlRequest = serde_json::from_value(json!({"query": "SELECT 1"})).unwrap();
        let SqlRequest::Single(statement) = request else {
            panic!("expected a single statement");
        };
        assert_eq!(QueryRequest::from(statement).params, Vec::<serde_json::Value>::new());
    }

    #[test]
    fn batches_parse() {
        let request: SqlRequest = serde_json::from_value(json!({
            "queries": [{"query": "INSERT INTO t VALUES ($1)", "params": ["a"]}, {"query": "SELECT 1"}]
        }))
        .unwrap();
        let SqlRequest::Batch { queries } = request else {
            panic!("expected a batch");
        };
        assert_eq!(queries.len(), 2);
    }

    #[test]
    fn bodies_without_a_query_are_rejected() {
        assert!(serde_json::from_value::<SqlRequest>(json!({"sql": "SELECT 1"})).is_err());
        assert!(serde_json::from_value::<SqlRequest>(json!({"query": 1})).is_err());
    }
}
