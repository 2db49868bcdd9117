use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use uuid::Uuid;

use query_engine_translation::translation::error::translate;

use crate::session::{SessionManager, SessionReply};
use crate::state::ServerState;

/// Upgrade to the persistent transport.
pub async fn get_v2(State(state): State<ServerState>, upgrade: WebSocketUpgrade) -> Response {
    let sessions = state.sessions.clone();
    upgrade.on_upgrade(move |socket| serve_session(socket, sessions))
}

/// Run one session: open its connection, answer messages in arrival order, and
/// close the connection when the socket goes away.
async fn serve_session(mut socket: WebSocket, sessions: Arc<SessionManager>) {
    let id = Uuid::new_v4();
    if let Err(error) = sessions.open(id).await {
        tracing::error!(session = %id, "unable to open session connection: {error}");
        let reply = SessionReply::from_envelope(translate(&error));
        let _ = socket.send(Message::Text(reply.to_text())).await;
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    while let Some(message) = socket.recv().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => break,
            Err(error) => {
                tracing::warn!(session = %id, "websocket error: {error}");
                break;
            }
        };
        let reply = sessions.handle_message(id, &text).await;
        if socket.send(Message::Text(reply.to_text())).await.is_err() {
            break;
        }
    }

    sessions.close(id).await;
}
