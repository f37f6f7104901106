//! The matching room: one actor owning every waiting/negotiating player.
//!
//! All membership and status mutation happens on the room loop, which
//! drains three channels one event at a time. Nothing else ever reads or
//! writes the player map, so the two-party status checks need no locking.

use std::collections::HashMap;

use tokio::sync::mpsc;

use shellmatch_common::{MatchMessage, MessageKind, Profile};

use crate::player::{MatchPlayer, Status};

/// Cloneable handle to the room loop. Every interaction with room state
/// goes through one of these three channels.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    register_tx: mpsc::UnboundedSender<MatchPlayer>,
    unregister_tx: mpsc::UnboundedSender<Profile>,
    message_tx: mpsc::UnboundedSender<MatchMessage>,
}

impl RoomHandle {
    /// Add a player to the room. Returns false once the room loop is gone.
    pub fn register(&self, player: MatchPlayer) -> bool {
        self.register_tx.send(player).is_ok()
    }

    /// Remove a player from the room.
    pub fn unregister(&self, profile: Profile) -> bool {
        self.unregister_tx.send(profile).is_ok()
    }

    /// Submit a negotiation message for processing.
    pub fn message(&self, msg: MatchMessage) -> bool {
        self.message_tx.send(msg).is_ok()
    }
}

enum RoomEvent {
    Register(MatchPlayer),
    Unregister(Profile),
    Message(MatchMessage),
}

/// The single authoritative holder of everyone currently matchable.
pub struct MatchRoom {
    players: HashMap<String, MatchPlayer>,
    register_rx: mpsc::UnboundedReceiver<MatchPlayer>,
    unregister_rx: mpsc::UnboundedReceiver<Profile>,
    message_rx: mpsc::UnboundedReceiver<MatchMessage>,
}

impl MatchRoom {
    pub fn new() -> (Self, RoomHandle) {
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let room = Self {
            players: HashMap::new(),
            register_rx,
            unregister_rx,
            message_rx,
        };
        let handle = RoomHandle {
            register_tx,
            unregister_tx,
            message_tx,
        };
        (room, handle)
    }

    /// Run the room loop until every handle is dropped.
    pub async fn run(mut self) {
        loop {
            let event = tokio::select! {
                // Registers drain first so a connection's first messages
                // can never outrun its own registration.
                biased;
                Some(player) = self.register_rx.recv() => RoomEvent::Register(player),
                Some(profile) = self.unregister_rx.recv() => RoomEvent::Unregister(profile),
                Some(msg) = self.message_rx.recv() => RoomEvent::Message(msg),
                else => break,
            };
            match event {
                RoomEvent::Register(player) => self.handle_register(player),
                RoomEvent::Unregister(profile) => self.handle_unregister(profile),
                RoomEvent::Message(msg) => self.handle_message(msg),
            }
        }
        tracing::debug!("room loop stopped");
    }

    fn handle_register(&mut self, player: MatchPlayer) {
        tracing::info!(name = %player.profile.name, "entered the room");
        // Replay the current roster to the newcomer, then announce them.
        for other in self.players.values() {
            if other.profile.id != player.profile.id {
                player.send(MatchMessage::broadcast(
                    other.profile.clone(),
                    MessageKind::Join,
                ));
            }
        }
        self.broadcast(MatchMessage::broadcast(
            player.profile.clone(),
            MessageKind::Join,
        ));
        self.players.insert(player.profile.id.clone(), player);
    }

    fn handle_unregister(&mut self, profile: Profile) {
        // Dropping the entry closes its outbound queue.
        if self.players.remove(&profile.id).is_some() {
            tracing::info!(name = %profile.name, "exited the room");
            self.broadcast(MatchMessage::broadcast(profile, MessageKind::Leave));
        }
    }

    fn handle_message(&mut self, msg: MatchMessage) {
        // Source is stamped by the read pump; a message without one, or
        // from a player already removed, has no reply address left.
        let Some(source) = msg.source.clone() else {
            return;
        };
        if !self.players.contains_key(&source.id) {
            tracing::debug!(name = %source.name, "message from player not in the room");
            return;
        }
        match msg.data {
            MessageKind::Offer => self.handle_offer(&source, msg),
            MessageKind::CancelOffer => self.handle_cancel_offer(&source, msg),
            MessageKind::Accept => self.handle_accept(&source, msg),
            MessageKind::Deny => self.handle_deny(&source, msg),
            _ => {
                tracing::debug!(name = %source.name, kind = ?msg.data, "unexpected message kind");
                self.reply_error(&source.id);
            }
        }
    }

    /// Both parties must be waiting; afterwards both are negotiating and
    /// the dest learns about the offer.
    fn handle_offer(&mut self, source: &Profile, msg: MatchMessage) {
        let Some(dest_id) = self.check_pair(source, &msg, Status::Waiting) else {
            return;
        };
        let to = msg.dest.as_ref().map(|d| d.name.clone()).unwrap_or_default();
        tracing::info!(from = %source.name, to = %to, "offer");
        self.set_status(&source.id, Status::Negotiating);
        self.set_status(&dest_id, Status::Negotiating);
        self.forward(&dest_id, msg);
    }

    // TODO: cancel/deny only check that neither side is WAITING, so a
    // negotiating sender can reset a third party that is negotiating with
    // someone else, stranding that party's counterpart. Tracking which pair
    // holds the open offer would reject those, and would also give
    // negotiations a place to hang an expiry.
    fn handle_cancel_offer(&mut self, source: &Profile, msg: MatchMessage) {
        let Some(dest_id) = self.check_pair(source, &msg, Status::Negotiating) else {
            return;
        };
        tracing::info!(from = %source.name, "offer cancelled");
        self.set_status(&source.id, Status::Waiting);
        self.set_status(&dest_id, Status::Waiting);
        self.forward(&dest_id, msg);
    }

    /// Statuses stay negotiating; both sides hear the accept and move on to
    /// session start.
    fn handle_accept(&mut self, source: &Profile, msg: MatchMessage) {
        let Some(dest_id) = self.check_pair(source, &msg, Status::Negotiating) else {
            return;
        };
        tracing::info!(from = %source.name, "offer accepted");
        self.forward(&source.id, msg.clone());
        self.forward(&dest_id, msg);
    }

    fn handle_deny(&mut self, source: &Profile, msg: MatchMessage) {
        let Some(dest_id) = self.check_pair(source, &msg, Status::Negotiating) else {
            return;
        };
        tracing::info!(from = %source.name, "offer denied");
        self.set_status(&source.id, Status::Waiting);
        self.set_status(&dest_id, Status::Waiting);
        self.forward(&dest_id, msg);
    }

    /// Validate that `msg` names a dest present in the room and that both
    /// parties are in `required` status. Replies ERROR to the source and
    /// yields None otherwise.
    fn check_pair(&self, source: &Profile, msg: &MatchMessage, required: Status) -> Option<String> {
        let Some(dest) = msg.dest.as_ref() else {
            self.reply_error(&source.id);
            return None;
        };
        let Some(dest_player) = self.players.get(&dest.id) else {
            self.reply_error(&source.id);
            return None;
        };
        let Some(source_player) = self.players.get(&source.id) else {
            return None;
        };
        if source_player.status != required || dest_player.status != required {
            self.reply_error(&source.id);
            return None;
        }
        Some(dest.id.clone())
    }

    fn set_status(&mut self, id: &str, status: Status) {
        if let Some(player) = self.players.get_mut(id) {
            player.status = status;
        }
    }

    fn forward(&self, id: &str, msg: MatchMessage) {
        if let Some(player) = self.players.get(id) {
            player.send(msg);
        }
    }

    fn reply_error(&self, id: &str) {
        self.forward(id, MatchMessage::error());
    }

    fn broadcast(&self, msg: MatchMessage) {
        for player in self.players.values() {
            player.send(msg.clone());
        }
    }
}
