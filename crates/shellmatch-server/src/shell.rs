//! Shell-backed session provider: one PTY-hosted shell per matched player.

use std::io::{Read, Write};
use std::thread;

use async_trait::async_trait;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use tokio::sync::mpsc;

use shellmatch_common::{Profile, SessionError};

use crate::session::{SessionHandle, SessionProvider};

const PTY_ROWS: u16 = 24;
const PTY_COLS: u16 = 80;
const READ_CHUNK: usize = 4096;
const CHANNEL_DEPTH: usize = 256;

/// The shell to run when none is configured.
///
/// - Unix: reads `$SHELL`, falls back to `/bin/sh`
/// - Windows: reads `$COMSPEC`, falls back to `cmd.exe`
pub fn default_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
    #[cfg(windows)]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    }
}

/// Environment variables the spawned shell may inherit. Everything else is
/// stripped so server-side secrets never reach a player's shell.
const ALLOWED_ENV_VARS: &[&str] = &["HOME", "USER", "LOGNAME", "PATH", "LANG"];

fn build_shell_command(shell: &str) -> CommandBuilder {
    let mut cmd = CommandBuilder::new(shell);
    cmd.env_clear();
    for key in ALLOWED_ENV_VARS {
        if let Ok(val) = std::env::var(key) {
            cmd.env(key, val);
        }
    }
    cmd.env("TERM", "xterm-256color");
    cmd
}

pub struct PtyShellProvider {
    shell: String,
}

impl PtyShellProvider {
    pub fn new(shell: Option<String>) -> Self {
        Self {
            shell: shell.unwrap_or_else(default_shell),
        }
    }
}

#[async_trait]
impl SessionProvider for PtyShellProvider {
    /// Open a PTY, spawn the shell on it, and wire both directions to
    /// channels: a reader thread feeds session output, a writer thread
    /// drains session input. Closing the handle kills the shell.
    async fn create_session(&self, profile: &Profile) -> Result<SessionHandle, SessionError> {
        let pty_system = native_pty_system();
        let size = PtySize {
            rows: PTY_ROWS,
            cols: PTY_COLS,
            pixel_width: 0,
            pixel_height: 0,
        };
        let pair = pty_system
            .openpty(size)
            .map_err(|e| SessionError::Provision(format!("failed to open pty: {e}")))?;

        let cmd = build_shell_command(&self.shell);
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SessionError::Provision(format!("failed to spawn '{}': {e}", self.shell)))?;
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SessionError::Provision(format!("failed to clone pty reader: {e}")))?;
        let mut writer = pair
            .master
            .take_writer()
            .map_err(|e| SessionError::Provision(format!("failed to take pty writer: {e}")))?;

        let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_DEPTH);
        let (input_tx, mut input_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_DEPTH);

        thread::Builder::new()
            .name("shell-reader".to_string())
            .spawn(move || {
                let mut buf = [0u8; READ_CHUNK];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break, // EOF, shell exited
                        Ok(n) => {
                            if output_tx.blocking_send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!("pty reader error: {e}");
                            break;
                        }
                    }
                }
            })
            .map_err(|e| SessionError::Provision(format!("failed to spawn reader thread: {e}")))?;

        thread::Builder::new()
            .name("shell-writer".to_string())
            .spawn(move || {
                while let Some(data) = input_rx.blocking_recv() {
                    if writer
                        .write_all(&data)
                        .and_then(|_| writer.flush())
                        .is_err()
                    {
                        break;
                    }
                }
            })
            .map_err(|e| SessionError::Provision(format!("failed to spawn writer thread: {e}")))?;

        tracing::info!(name = %profile.name, shell = %self.shell, "shell spawned");

        let master = pair.master;
        Ok(SessionHandle::new(input_tx, output_rx, move || {
            let mut child = child;
            if let Err(e) = child.kill() {
                tracing::debug!("shell kill error (may already be dead): {e}");
            }
            drop(master);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[test]
    fn default_shell_is_nonempty() {
        assert!(!default_shell().is_empty());
    }

    #[test]
    fn allowed_env_excludes_secret_shapes() {
        for var in ALLOWED_ENV_VARS {
            let lower = var.to_lowercase();
            assert!(!lower.contains("key"));
            assert!(!lower.contains("secret"));
            assert!(!lower.contains("token"));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_session_echoes_input() {
        let provider = PtyShellProvider::new(Some("/bin/sh".into()));
        let mut session = provider
            .create_session(&Profile::new("alice"))
            .await
            .expect("session should spawn");

        session
            .input()
            .send(b"echo SHELLMATCH_MARKER_4242\n".to_vec())
            .await
            .expect("input send");

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, session.read()).await {
                Ok(Some(chunk)) => {
                    seen.extend_from_slice(&chunk);
                    if String::from_utf8_lossy(&seen).contains("SHELLMATCH_MARKER_4242") {
                        break;
                    }
                }
                Ok(None) => panic!("session ended before echoing"),
                Err(_) => panic!(
                    "timed out, output so far: {}",
                    String::from_utf8_lossy(&seen)
                ),
            }
        }
        session.close();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn close_ends_the_session() {
        let provider = PtyShellProvider::new(Some("/bin/sh".into()));
        let mut session = provider
            .create_session(&Profile::new("alice"))
            .await
            .expect("session should spawn");
        session.close();

        // Output drains to end-of-stream once the shell is killed.
        let ended = tokio::time::timeout(Duration::from_secs(5), async {
            while session.read().await.is_some() {}
        })
        .await;
        assert!(ended.is_ok(), "output should reach end-of-stream");
    }

    #[tokio::test]
    async fn missing_shell_is_a_provision_error() {
        let provider = PtyShellProvider::new(Some("/definitely/not/a/shell".into()));
        match provider.create_session(&Profile::new("alice")).await {
            Err(SessionError::Provision(_)) => {}
            Ok(_) => panic!("expected provision failure"),
            Err(other) => panic!("expected provision error, got {other}"),
        }
    }
}
