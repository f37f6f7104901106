//! Bridges a matched client's connection to a freshly provisioned backend
//! session and copies bytes both ways until either side finishes.

use std::sync::Arc;

use shellmatch_common::{Profile, SessionError};

use crate::session::SessionProvider;
use crate::transport::MatchConn;

pub struct GameRelay {
    provider: Arc<dyn SessionProvider>,
}

impl GameRelay {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self { provider }
    }

    /// Provision a session for `profile` and stream bytes between it and
    /// the client until one direction ends. The relay never interprets the
    /// bytes. The session is closed exactly once on the way out, whichever
    /// side failed first; provisioning failure aborts only this attempt.
    pub async fn start(&self, conn: Arc<MatchConn>, profile: &Profile) -> Result<(), SessionError> {
        let mut session = self.provider.create_session(profile).await?;
        tracing::info!(name = %profile.name, "session bridged");

        let input = session.input();
        let client_to_session = async {
            loop {
                match conn.read_data().await {
                    Ok(data) => {
                        if input.send(data).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        };
        let session_to_client = async {
            loop {
                match session.read().await {
                    Some(data) => {
                        if conn.write_data(&data).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        };
        tokio::select! {
            _ = client_to_session => {}
            _ = session_to_client => {}
        }

        session.close();
        conn.close().await;
        tracing::info!(name = %profile.name, "session ended");
        Ok(())
    }
}
