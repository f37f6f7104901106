//! Per-connection handler: read the hello, then hand the socket to the
//! matching room or the session relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;

use shellmatch_common::{ClientHello, MatchMessage, Profile};

use crate::player::{self, MatchPlayer};
use crate::relay::GameRelay;
use crate::room::RoomHandle;
use crate::transport::MatchConn;

const HELLO_WAIT: Duration = Duration::from_secs(10);

/// Handle a single accepted WebSocket connection.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    room: RoomHandle,
    relay: Arc<GameRelay>,
    wait_budget: Duration,
) {
    let conn = Arc::new(MatchConn::new(ws));

    let hello = match read_hello(&conn, addr).await {
        Some(hello) => hello,
        None => {
            conn.close().await;
            return;
        }
    };

    match hello {
        ClientHello::Matching { profile } => {
            tracing::info!(peer = %addr, name = %profile.name, "joining the matching room");
            wait_match(conn, profile, room, wait_budget).await;
        }
        ClientHello::Shell { profile } => {
            tracing::info!(peer = %addr, name = %profile.name, "shell session requested");
            if let Err(e) = relay.start(conn, &profile).await {
                tracing::warn!(peer = %addr, name = %profile.name, error = %e, "relay failed");
            }
        }
    }
}

/// Register the player and run its pumps. Returns once the connection is
/// done; by then the pumps have unregistered the player.
async fn wait_match(
    conn: Arc<MatchConn>,
    profile: Profile,
    room: RoomHandle,
    wait_budget: Duration,
) {
    let (tx, queue) = mpsc::unbounded_channel::<MatchMessage>();
    room.register(MatchPlayer::new(profile.clone(), tx));
    tokio::spawn(player::read_pump(conn.clone(), profile.clone(), room.clone()));
    player::write_pump(conn, profile, queue, room, wait_budget).await;
}

/// Read and parse the first frame as a hello, with its own short deadline.
async fn read_hello(conn: &MatchConn, addr: SocketAddr) -> Option<ClientHello> {
    let payload = match tokio::time::timeout(HELLO_WAIT, conn.read_data()).await {
        Ok(Ok(payload)) => payload,
        Ok(Err(e)) => {
            tracing::debug!(peer = %addr, error = %e, "connection ended before hello");
            return None;
        }
        Err(_) => {
            tracing::warn!(peer = %addr, "hello timeout");
            return None;
        }
    };
    match serde_json::from_slice::<ClientHello>(&payload) {
        Ok(hello) => Some(hello),
        Err(e) => {
            tracing::warn!(peer = %addr, error = %e, "invalid hello");
            None
        }
    }
}
