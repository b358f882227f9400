use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use skyline_protocol::subscribe_url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

use crate::error::{IngestError, IngestResult};

/// Opens connections to the event stream.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect, resuming after `cursor` when given.
    async fn connect(&self, cursor: Option<i64>) -> IngestResult<Box<dyn FrameSource>>;
}

/// One live connection delivering whole frames in order.
#[async_trait]
pub trait FrameSource: Send {
    /// The next frame, or `None` once the upstream closed the stream.
    ///
    /// Must be cancel-safe: the ingestion loop races it against shutdown.
    async fn next_frame(&mut self) -> IngestResult<Option<Bytes>>;
}

/// `subscribeRepos` over a WebSocket.
#[derive(Clone, Debug)]
pub struct WebSocketConnector {
    relay: String,
}

impl WebSocketConnector {
    pub fn new(relay: impl Into<String>) -> Self {
        Self {
            relay: relay.into(),
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, cursor: Option<i64>) -> IngestResult<Box<dyn FrameSource>> {
        let url = subscribe_url(&self.relay, cursor);
        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| IngestError::Connect {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        info!(%url, status = %response.status(), "connected to firehose");
        Ok(Box::new(WebSocketSource { stream }))
    }
}

struct WebSocketSource {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn next_frame(&mut self) -> IngestResult<Option<Bytes>> {
        while let Some(msg) = self.stream.next().await {
            match msg.map_err(|e| IngestError::Transport(e.to_string()))? {
                Message::Binary(data) => return Ok(Some(Bytes::from(data))),
                Message::Close(frame) => {
                    debug!(?frame, "firehose sent close");
                    return Ok(None);
                }
                // pongs are queued by tungstenite and flushed on the next read
                Message::Ping(_) | Message::Pong(_) => trace!("keepalive"),
                Message::Text(text) => debug!(len = text.len(), "ignoring text message"),
                Message::Frame(_) => {}
            }
        }
        Ok(None)
    }
}
