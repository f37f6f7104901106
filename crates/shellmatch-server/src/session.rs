//! Seam to the backend that provisions interactive sessions for matched
//! players. The relay only ever sees this interface.

use async_trait::async_trait;
use tokio::sync::mpsc;

use shellmatch_common::{Profile, SessionError};

/// Provisions one backend session per matched player.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn create_session(&self, profile: &Profile) -> Result<SessionHandle, SessionError>;
}

/// A live backend session as a channel duplex: bytes out of the session
/// arrive on the output queue, bytes for the session go into the input
/// queue. How the backend shuttles them is the provider's business.
pub struct SessionHandle {
    input: mpsc::Sender<Vec<u8>>,
    output: mpsc::Receiver<Vec<u8>>,
    closer: Option<Box<dyn FnOnce() + Send>>,
}

impl SessionHandle {
    pub fn new(
        input: mpsc::Sender<Vec<u8>>,
        output: mpsc::Receiver<Vec<u8>>,
        closer: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            input,
            output,
            closer: Some(Box::new(closer)),
        }
    }

    /// Sender half for feeding the session. Sends fail once the backend is
    /// gone.
    pub fn input(&self) -> mpsc::Sender<Vec<u8>> {
        self.input.clone()
    }

    /// Next chunk of session output. `None` means the session ended.
    pub async fn read(&mut self) -> Option<Vec<u8>> {
        self.output.recv().await
    }

    /// Tear down the backing session. Only the first call has any effect.
    pub fn close(&mut self) {
        if let Some(close) = self.closer.take() {
            close();
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.close();
    }
}
