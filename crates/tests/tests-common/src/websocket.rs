//! A WebSocket client for the persistent transport.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebSocketClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketClient {
    /// Connect to `/v2` on a running server.
    pub async fn connect(address: SocketAddr) -> anyhow::Result<WebSocketClient> {
        let (stream, _) = connect_async(format!("ws://{address}/v2")).await?;
        Ok(WebSocketClient { stream })
    }

    pub async fn send_text(&mut self, text: impl Into<String>) -> anyhow::Result<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Send a query message and wait for its reply.
    pub async fn query(&mut self, sql: &str, params: Option<Value>) -> anyhow::Result<Value> {
        let mut message = json!({"type": "query", "query": sql});
        if let Some(params) = params {
            message["params"] = params;
        }
        self.send_text(message.to_string()).await?;
        self.receive_json().await
    }

    /// The next text frame, parsed as JSON.
    pub async fn receive_json(&mut self) -> anyhow::Result<Value> {
        loop {
            let next = timeout(RECEIVE_TIMEOUT, self.stream.next())
                .await
                .map_err(|_| anyhow!("timed out waiting for a message"))?;
            match next {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(other)) => bail!("unexpected message {other:?}"),
                Some(Err(error)) => return Err(error.into()),
                None => bail!("connection closed"),
            }
        }
    }

    /// Whether the server closes the connection next.
    pub async fn is_closed_by_server(&mut self) -> bool {
        match timeout(RECEIVE_TIMEOUT, self.stream.next()).await {
            Ok(None | Some(Ok(Message::Close(_)) | Err(_))) => true,
            Ok(Some(_)) | Err(_) => false,
        }
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
