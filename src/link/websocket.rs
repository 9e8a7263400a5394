use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::{Connector, LinkError, MessageLink};

/// WebSocket client endpoint, e.g. `ws://192.168.1.116:81`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    uri: String,
}

impl WsConnector {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

impl Connector for WsConnector {
    type Link = WsLink;

    fn endpoint(&self) -> &str {
        &self.uri
    }

    async fn connect(&self) -> Result<WsLink, LinkError> {
        debug!("Opening WebSocket to {}", self.uri);
        let (stream, response) =
            connect_async(self.uri.as_str())
                .await
                .map_err(|e| LinkError::ConnectFailed {
                    endpoint: self.uri.clone(),
                    reason: e.to_string(),
                })?;
        debug!("WebSocket handshake done: HTTP {}", response.status());
        Ok(WsLink { stream })
    }
}

pub struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl MessageLink for WsLink {
    async fn send_text(&mut self, text: String) -> Result<(), LinkError> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<Option<String>, LinkError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(bytes))) => {
                    // Non-UTF-8 payloads are passed on and fail decoding downstream
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Peer sent close frame: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(other)) => trace!("Ignoring control frame: {:?}", other),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Error while closing WebSocket: {}", e);
        }
    }
}
