use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::domain::run::RunId;
use crate::domain::services::{EventConnection, EventSource};
use crate::errors::{ClientError, ClientResult};

/// WebSocket implementation of EventSource
///
/// Each run's stream lives at `{ws_base}/ws/{run_id}`.
pub struct WebSocketEventSource {
    ws_base: String,
}

impl WebSocketEventSource {
    pub fn new(ws_base: impl Into<String>) -> Self {
        Self {
            ws_base: ws_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn stream_url(&self, run_id: &RunId) -> String {
        format!("{}/ws/{}", self.ws_base, run_id)
    }
}

#[async_trait]
impl EventSource for WebSocketEventSource {
    async fn connect(&self, run_id: &RunId) -> ClientResult<Box<dyn EventConnection>> {
        let url = self.stream_url(run_id);
        tracing::debug!("Connecting to {}", url);

        let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::Transport(format!("Cannot open event stream {}: {}", url, e)))?;

        Ok(Box::new(WebSocketConnection {
            stream,
            closed: false,
        }))
    }
}

/// Open WebSocket carrying one run's events
pub struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl EventConnection for WebSocketConnection {
    async fn next_message(&mut self) -> ClientResult<Option<String>> {
        if self.closed {
            return Ok(None);
        }

        while let Some(message) = self.stream.next().await {
            let message =
                message.map_err(|e| ClientError::Transport(format!("Event stream failed: {}", e)))?;

            match message {
                Message::Text(text) => return Ok(Some(text.to_string())),
                Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => tracing::warn!("Skipping non UTF-8 binary frame"),
                },
                Message::Close(_) => {
                    self.closed = true;
                    return Ok(None);
                }
                _ => {}
            }
        }

        self.closed = true;
        Ok(None)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.stream.send(Message::Close(None)).await {
            tracing::debug!("Close frame not sent: {}", e);
        }
    }
}
