//! Wire protocol for the matchmaking endpoint. Only the first frame of a
//! connection is a hello; everything after on a negotiation connection is a
//! `MatchMessage`, and everything on a shell connection is opaque bytes.

use serde::{Deserialize, Serialize};

use crate::profile::Profile;

/// First message a client sends to identify itself and pick an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientHello {
    /// Enter the matching room and wait for an opponent.
    #[serde(rename = "matching_hello")]
    Matching { profile: Profile },

    /// Bridge this connection to a freshly provisioned shell session.
    #[serde(rename = "shell_hello")]
    Shell { profile: Profile },
}

/// Negotiation message kinds as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Offer,
    CancelOffer,
    Accept,
    Deny,
    Join,
    Leave,
    Error,
    /// Anything this build does not recognize. Never sent; the room answers
    /// it with `Error`.
    #[serde(other)]
    Unknown,
}

/// One negotiation message. `source` is stamped by the server from the
/// connection's bound identity, so clients cannot speak for each other.
/// `dest` is absent on JOIN/LEAVE broadcasts and on ERROR replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<Profile>,
    pub data: MessageKind,
}

impl MatchMessage {
    /// An in-band protocol error reply.
    pub fn error() -> Self {
        Self {
            source: None,
            dest: None,
            data: MessageKind::Error,
        }
    }

    /// A membership broadcast (JOIN/LEAVE) about `who`.
    pub fn broadcast(who: Profile, data: MessageKind) -> Self {
        Self {
            source: Some(who),
            dest: None,
            data,
        }
    }
}
