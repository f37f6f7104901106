//! Guarded WebSocket transport: at most one in-flight read and one
//! in-flight write per physical connection, with keepalive deadlines.
//!
//! Both matchmaking pumps and the session relay share one `MatchConn`; the
//! two internal locks keep a keepalive ping from ever corrupting an
//! application frame, and partial reads from interleaving.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use shellmatch_common::{ConnError, MatchMessage};

/// Bound on each outbound frame write.
pub const WRITE_WAIT: Duration = Duration::from_secs(20);
/// Read deadline; restarts on every inbound frame, pongs included.
pub const READ_WAIT: Duration = Duration::from_secs(60);
/// Keepalive ping interval. Must stay well under `READ_WAIT`.
pub const PING_PERIOD: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// One accepted duplex connection with guarded framed read/write.
pub struct MatchConn {
    reader: Mutex<WsSource>,
    writer: Mutex<WsSink>,
    closed: AtomicBool,
}

impl MatchConn {
    pub fn new(ws: WebSocketStream<TcpStream>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            reader: Mutex::new(stream),
            writer: Mutex::new(sink),
            closed: AtomicBool::new(false),
        }
    }

    /// Read the next negotiation message.
    pub async fn read_message(&self) -> Result<MatchMessage, ConnError> {
        let payload = self.next_payload().await?;
        serde_json::from_slice(&payload).map_err(|e| ConnError::Decode(e.to_string()))
    }

    /// Read the next raw payload (text or binary), for the relay path.
    pub async fn read_data(&self) -> Result<Vec<u8>, ConnError> {
        self.next_payload().await
    }

    /// Block until an application frame arrives. Holds the read guard for
    /// the whole call so frames never interleave across callers. Pings are
    /// answered in place; any inbound frame restarts the read deadline.
    async fn next_payload(&self) -> Result<Vec<u8>, ConnError> {
        let mut reader = self.reader.lock().await;
        loop {
            let frame = tokio::time::timeout(READ_WAIT, reader.next())
                .await
                .map_err(|_| ConnError::Timeout)?;
            match frame {
                Some(Ok(Message::Text(text))) => return Ok(text.as_bytes().to_vec()),
                Some(Ok(Message::Binary(data))) => return Ok(data.to_vec()),
                Some(Ok(Message::Ping(data))) => {
                    self.write_frame(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => return Err(ConnError::Closed),
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => return Err(conn_error(e)),
            }
        }
    }

    pub async fn write_message(&self, msg: &MatchMessage) -> Result<(), ConnError> {
        let json = serde_json::to_string(msg).map_err(|e| ConnError::Encode(e.to_string()))?;
        self.write_frame(Message::Text(json.into())).await
    }

    pub async fn write_data(&self, data: &[u8]) -> Result<(), ConnError> {
        self.write_frame(Message::Binary(data.to_vec().into())).await
    }

    pub async fn ping(&self) -> Result<(), ConnError> {
        self.write_frame(Message::Ping(Vec::new().into())).await
    }

    async fn write_frame(&self, frame: Message) -> Result<(), ConnError> {
        let mut writer = self.writer.lock().await;
        match tokio::time::timeout(WRITE_WAIT, writer.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(conn_error(e)),
            Err(_) => Err(ConnError::Timeout),
        }
    }

    /// Close the underlying socket. Safe to call from both pumps; only the
    /// first call performs the close handshake.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut writer = self.writer.lock().await;
        let _ = writer.close().await;
    }
}

fn conn_error(e: WsError) -> ConnError {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => ConnError::Closed,
        other => ConnError::Transport(other.to_string()),
    }
}
