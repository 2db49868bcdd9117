//! Sessions for the persistent transport.
//!
//! Every WebSocket gets one dedicated backend connection, registered under a
//! random identifier when the socket opens and closed when it goes away. Nothing
//! else releases a session.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tokio::sync::{Mutex, RwLock};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use query_engine_execution::metrics::Metrics;
use query_engine_execution::{execute, QueryRequest};
use query_engine_translation::translation::error::{translate, translate_encoding, ErrorEnvelope};
use query_engine_translation::translation::result::{relay, ResultEnvelope};

/// A message from the client. Only `{"type": "query"}` is understood.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub params: Option<Vec<serde_json::Value>>,
}

/// A reply to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionReply {
    Result {
        data: ResultEnvelope,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl SessionReply {
    pub fn error(message: impl Into<String>) -> SessionReply {
        SessionReply::Error {
            message: message.into(),
            code: None,
        }
    }

    pub fn from_envelope(envelope: ErrorEnvelope) -> SessionReply {
        SessionReply::Error {
            message: envelope.message,
            code: Some(envelope.code),
        }
    }

    /// The reply as a text frame.
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|error| {
            tracing::error!("unable to serialize session reply: {error}");
            r#"{"type":"error","message":"Unable to serialize reply"}"#.to_string()
        })
    }
}

type SessionConnection = Arc<Mutex<PgConnection>>;

/// Owns the dedicated connection of every open session.
#[derive(Debug)]
pub struct SessionManager {
    connect_options: Arc<PgConnectOptions>,
    sessions: RwLock<HashMap<Uuid, SessionConnection>>,
    metrics: Metrics,
}

impl SessionManager {
    pub fn new(connect_options: Arc<PgConnectOptions>, metrics: Metrics) -> SessionManager {
        SessionManager {
            connect_options,
            sessions: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Open a dedicated connection and register it under `id`.
    pub async fn open(&self, id: Uuid) -> Result<(), query_engine_execution::Error> {
        let connection = PgConnection::connect_with(&self.connect_options)
            .instrument(info_span!("Open session connection"))
            .await?;
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(connection)));
        self.metrics.active_sessions.inc();
        tracing::info!(session = %id, "session opened");
        Ok(())
    }

    /// Handle one inbound message. Failures become error replies; the session
    /// stays open either way.
    pub async fn handle_message(&self, id: Uuid, text: &str) -> SessionReply {
        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(session = %id, "invalid message: {error}");
                return SessionReply::error(format!("Invalid message: {error}"));
            }
        };
        let query = match (message.message_type.as_str(), message.query) {
            ("query", Some(query)) => query,
            ("query", None) => return SessionReply::error("Missing query"),
            (other, _) => return SessionReply::error(format!("Unsupported message type: {other}")),
        };

        let Some(connection) = self.sessions.read().await.get(&id).cloned() else {
            return SessionReply::error("Session not found");
        };

        let request = QueryRequest::new(query).with_params(message.params.unwrap_or_default());
        let mut connection = connection.lock().await;
        let result = execute(&mut *connection, &request)
            .instrument(info_span!("Execute query", session = %id))
            .await;
        self.metrics.record_query(&result);

        match result {
            Ok(output) => match relay(&output) {
                Ok(data) => SessionReply::Result { data },
                Err(error) => SessionReply::from_envelope(translate_encoding(&error)),
            },
            Err(error) => {
                tracing::warn!(session = %id, "query failed: {error}");
                SessionReply::from_envelope(translate(&error))
            }
        }
    }

    /// Close the session's connection and forget it.
    pub async fn close(&self, id: Uuid) {
        let Some(connection) = self.sessions.write().await.remove(&id) else {
            return;
        };
        self.metrics.active_sessions.dec();
        // a connection still held by a message in flight closes when dropped
        if let Ok(connection) = Arc::try_unwrap(connection) {
            if let Err(error) = connection.into_inner().close().await {
                tracing::warn!(session = %id, "error closing session connection: {error}");
            }
        }
        tracing::info!(session = %id, "session closed");
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
