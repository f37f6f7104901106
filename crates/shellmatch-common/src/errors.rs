/// Failures on one matchmaking/shell connection. Local to that connection;
/// pumps surface them to the room only as an unregister event.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    /// Peer or local close. Expected during teardown, not a failure.
    #[error("connection closed")]
    Closed,

    /// Read deadline elapsed without any inbound frame or pong.
    #[error("keepalive deadline elapsed")]
    Timeout,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnError {
    /// Whether this is ordinary teardown rather than a fault worth warning
    /// about.
    pub fn is_expected_close(&self) -> bool {
        matches!(self, ConnError::Closed)
    }
}

/// Failures around a backend shell session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The provider could not create a session. Fatal to the one relay
    /// attempt, nothing else.
    #[error("session provision failed: {0}")]
    Provision(String),

    #[error("session io error: {0}")]
    Io(String),
}
