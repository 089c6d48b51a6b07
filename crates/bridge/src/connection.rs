//! Transports and the connection lifecycle
//!
//! A [`Link`] carries whole text frames. Two are provided: WebSocket text
//! frames and newline-delimited TCP. [`ConnectionManager`] owns at most one
//! link, or one connect in progress, and turns their activity into
//! [`LinkEvent`]s.
//!
//! [`ConnectionManager::next_event`] is cancel-safe: the connect future lives
//! in the manager, and both links read with cancel-safe primitives, so losing
//! a `select!` race loses nothing.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::Endpoint;
use crate::error::{BridgeError, Result};

/// Give up on an endpoint that neither accepts nor refuses.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A bidirectional frame transport.
#[async_trait]
pub trait Link: Send {
    async fn send_text(&mut self, frame: &str) -> Result<()>;

    /// Next inbound frame; `None` once the peer has closed.
    async fn recv_text(&mut self) -> Result<Option<String>>;

    async fn close(&mut self) -> Result<()>;
}

/// WebSocket link, one frame per text message.
pub struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsLink {
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _) = connect_async(url).await?;
        Ok(Self { stream })
    }
}

#[async_trait]
impl Link for WsLink {
    async fn send_text(&mut self, frame: &str) -> Result<()> {
        self.stream.send(WsMessage::Text(frame.to_string())).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                None | Some(Ok(WsMessage::Close(_))) => return Ok(None),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(WsMessage::Text(text))) => return Ok(Some(text)),
                Some(Ok(WsMessage::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => warn!("dropping non-utf8 binary frame"),
                },
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Line-delimited JSON over TCP.
pub struct TcpLineLink {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TcpLineLink {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }
}

#[async_trait]
impl Link for TcpLineLink {
    async fn send_text(&mut self, frame: &str) -> Result<()> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<Option<String>> {
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim_end_matches('\r');
            if !line.trim().is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Open a link to `endpoint`, bounded by [`CONNECT_TIMEOUT`].
pub async fn open(endpoint: &Endpoint) -> Result<Box<dyn Link>> {
    let connect = async {
        let link: Box<dyn Link> = match endpoint {
            Endpoint::WebSocket(url) => Box::new(WsLink::connect(url).await?),
            Endpoint::TcpLines(addr) => Box::new(TcpLineLink::connect(addr).await?),
        };
        Ok::<_, BridgeError>(link)
    };
    tokio::time::timeout(CONNECT_TIMEOUT, connect)
        .await
        .map_err(|_| BridgeError::Transport(format!("connect to {endpoint} timed out")))?
}

/// Something happened on the transport.
#[derive(Debug)]
pub enum LinkEvent {
    Opened,
    Frame(String),
    /// The peer closed the connection.
    Closed,
    /// Connecting, reading, or writing failed.
    Failed(BridgeError),
}

#[derive(Default)]
pub struct ConnectionManager {
    endpoint: Option<Endpoint>,
    connecting: Option<BoxFuture<'static, Result<Box<dyn Link>>>>,
    link: Option<Box<dyn Link>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting.is_some()
    }

    /// Start connecting to `endpoint`, dropping any current link or attempt.
    /// Progress is made by [`next_event`](Self::next_event).
    pub fn begin_connect(&mut self, endpoint: Endpoint) {
        self.abort();
        info!("connecting to {}", endpoint);
        let target = endpoint.clone();
        self.connecting = Some(async move { open(&target).await }.boxed());
        self.endpoint = Some(endpoint);
    }

    /// Wait for the next transport event. Pends forever while idle.
    pub async fn next_event(&mut self) -> LinkEvent {
        if let Some(connecting) = self.connecting.as_mut() {
            let result = connecting.await;
            self.connecting = None;
            return match result {
                Ok(link) => {
                    self.link = Some(link);
                    LinkEvent::Opened
                }
                Err(e) => LinkEvent::Failed(e),
            };
        }

        let Some(link) = self.link.as_mut() else {
            return std::future::pending().await;
        };
        match link.recv_text().await {
            Ok(Some(frame)) => LinkEvent::Frame(frame),
            Ok(None) => {
                self.link = None;
                LinkEvent::Closed
            }
            Err(e) => {
                self.link = None;
                LinkEvent::Failed(e)
            }
        }
    }

    pub async fn send(&mut self, frame: &str) -> Result<()> {
        let link = self
            .link
            .as_mut()
            .ok_or_else(|| BridgeError::Transport("not connected".into()))?;
        if let Err(e) = link.send_text(frame).await {
            self.link = None;
            return Err(e);
        }
        Ok(())
    }

    /// Close the link politely, then drop it.
    pub async fn close(&mut self) {
        self.connecting = None;
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.close().await {
                debug!("close: {}", e);
            }
        }
    }

    /// Drop the link and any connect in progress without ceremony.
    pub fn abort(&mut self) {
        self.connecting = None;
        self.link = None;
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint)
            .field("connecting", &self.connecting.is_some())
            .field("open", &self.link.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    #[tokio::test]
    async fn tcp_link_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut manager = ConnectionManager::new();
        manager.begin_connect(Endpoint::TcpLines(addr.to_string()));
        assert!(manager.is_connecting());

        let (accepted, event) = tokio::join!(listener.accept(), manager.next_event());
        assert!(matches!(event, LinkEvent::Opened));
        assert!(manager.is_open());

        let mut peer = TcpLineLink::from_stream(accepted.unwrap().0);
        manager.send(r#"{"type":"rules"}"#).await.unwrap();
        assert_eq!(
            peer.recv_text().await.unwrap().as_deref(),
            Some(r#"{"type":"rules"}"#)
        );

        peer.send_text(r#"{"type":"ready"}"#).await.unwrap();
        let event = timeout(Duration::from_secs(2), manager.next_event())
            .await
            .unwrap();
        assert!(matches!(event, LinkEvent::Frame(f) if f == r#"{"type":"ready"}"#));

        drop(peer);
        let event = timeout(Duration::from_secs(2), manager.next_event())
            .await
            .unwrap();
        assert!(matches!(event, LinkEvent::Closed));
        assert!(!manager.is_open());
    }

    #[tokio::test]
    async fn refused_connect_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut manager = ConnectionManager::new();
        manager.begin_connect(Endpoint::TcpLines(addr.to_string()));
        let event = timeout(Duration::from_secs(6), manager.next_event())
            .await
            .unwrap();
        assert!(matches!(event, LinkEvent::Failed(BridgeError::Transport(_))));
        assert!(!manager.is_open());
        assert!(!manager.is_connecting());
    }

    #[test]
    fn idle_manager_pends() {
        let mut manager = ConnectionManager::new();
        {
            let mut event = tokio_test::task::spawn(manager.next_event());
            tokio_test::assert_pending!(event.poll());
        }
        assert!(tokio_test::block_on(manager.send("{}")).is_err());
    }

    #[tokio::test]
    async fn connect_survives_cancelled_polls() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut manager = ConnectionManager::new();
        manager.begin_connect(Endpoint::TcpLines(addr.to_string()));

        // Poll briefly and give up; the attempt must survive the dropped poll.
        let opened = match timeout(Duration::from_millis(1), manager.next_event()).await {
            Ok(event) => matches!(event, LinkEvent::Opened),
            Err(_) => matches!(
                timeout(Duration::from_secs(2), manager.next_event()).await,
                Ok(LinkEvent::Opened)
            ),
        };
        assert!(opened);
        assert!(manager.is_open());
        drop(listener);
    }
}
