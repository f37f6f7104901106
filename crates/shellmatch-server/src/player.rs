//! Per-connection matchmaking player: bound identity, negotiation status,
//! outbound queue, and the two pumps bridging the transport to the room.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use shellmatch_common::{MatchMessage, Profile};

use crate::room::RoomHandle;
use crate::transport::{MatchConn, PING_PERIOD};

/// Where a player stands in the offer/accept protocol.
///
/// Written only by the room loop; the pumps never touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Waiting,
    Negotiating,
}

/// Room-side state for one live negotiation connection.
#[derive(Debug)]
pub struct MatchPlayer {
    pub profile: Profile,
    pub status: Status,
    tx: mpsc::UnboundedSender<MatchMessage>,
}

impl MatchPlayer {
    pub fn new(profile: Profile, tx: mpsc::UnboundedSender<MatchMessage>) -> Self {
        Self {
            profile,
            status: Status::Waiting,
            tx,
        }
    }

    /// Queue a message for this player's write pump. A send to a closed
    /// queue is dropped so the room loop never blocks on a dead peer.
    pub fn send(&self, msg: MatchMessage) {
        let _ = self.tx.send(msg);
    }
}

/// Forward inbound negotiation messages to the room for the lifetime of the
/// connection, stamping each with the bound identity. Any read failure ends
/// the pump and unregisters the player.
pub async fn read_pump(conn: Arc<MatchConn>, profile: Profile, room: RoomHandle) {
    loop {
        match conn.read_message().await {
            Ok(mut msg) => {
                msg.source = Some(profile.clone());
                if !room.message(msg) {
                    break;
                }
            }
            Err(e) if e.is_expected_close() => {
                tracing::debug!(name = %profile.name, "negotiation connection closed");
                break;
            }
            Err(e) => {
                tracing::warn!(name = %profile.name, error = %e, "negotiation read failed");
                break;
            }
        }
    }
    conn.close().await;
    room.unregister(profile);
}

/// Drain the outbound queue to the connection in arrival order, pinging
/// when idle. The pump stops when the queue closes, a write fails, or the
/// wait budget runs out, so an idle player cannot occupy the room forever.
pub async fn write_pump(
    conn: Arc<MatchConn>,
    profile: Profile,
    mut queue: mpsc::UnboundedReceiver<MatchMessage>,
    room: RoomHandle,
    wait_budget: Duration,
) {
    let deadline = tokio::time::Instant::now() + wait_budget;
    let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + PING_PERIOD, PING_PERIOD);
    loop {
        tokio::select! {
            biased;
            maybe = queue.recv() => match maybe {
                Some(msg) => {
                    if let Err(e) = conn.write_message(&msg).await {
                        tracing::debug!(name = %profile.name, error = %e, "negotiation write failed");
                        break;
                    }
                }
                // Queue closed by the room; nothing more can arrive.
                None => break,
            },
            _ = ping.tick() => {
                if conn.ping().await.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                tracing::info!(name = %profile.name, "wait budget exhausted, leaving the room");
                break;
            }
        }
    }
    conn.close().await;
    room.unregister(profile);
}
