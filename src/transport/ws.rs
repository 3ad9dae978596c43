//! WebSocket transport on tokio-tungstenite.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

use super::{Connection, Connector, Inbound};
use crate::error::LiveResult;
use crate::models::DisconnectReason;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials `ws://` / `wss://` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    #[instrument(skip(self))]
    async fn open(&self, endpoint: &str) -> LiveResult<Box<dyn Connection>> {
        let (stream, response) = tokio_tungstenite::connect_async(endpoint).await?;
        debug!(status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WsConnection::new(stream)))
    }
}

pub struct WsConnection {
    stream: WsStream,
    failed: bool,
}

impl WsConnection {
    fn new(stream: WsStream) -> Self {
        Self {
            stream,
            failed: false,
        }
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn next(&mut self) -> Inbound {
        if self.failed {
            return Inbound::Closed(DisconnectReason::new("Connection failed"));
        }
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Inbound::Text(text),
                Some(Ok(Message::Binary(data))) => {
                    return Inbound::Text(String::from_utf8_lossy(&data).into_owned())
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = match frame {
                        Some(f) => DisconnectReason::with_code(f.reason.to_string(), f.code.into()),
                        None => DisconnectReason::new("Server closed connection"),
                    };
                    return Inbound::Closed(reason);
                }
                // Pongs to server pings are queued by tungstenite itself.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    self.failed = true;
                    return Inbound::Error(e.to_string());
                }
                None => return Inbound::Closed(DisconnectReason::new("WebSocket stream ended")),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "websocket close failed");
        }
    }
}
