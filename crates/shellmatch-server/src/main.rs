//! shellmatch-server: matchmaking coordinator and shell-session relay.
//!
//! Accepts WebSocket connections on one port. A connection's first frame
//! names its endpoint: `matching_hello` enters the offer/accept matching
//! room, `shell_hello` bridges the connection to a freshly spawned shell
//! session once a match has been agreed. The server never inspects session
//! bytes.

mod connection;
mod player;
mod relay;
mod room;
mod session;
mod shell;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

use crate::connection::handle_connection;
use crate::relay::GameRelay;
use crate::room::MatchRoom;
use crate::shell::PtyShellProvider;

#[derive(Parser)]
#[command(
    name = "shellmatch-server",
    about = "Matchmaking and shell-session relay for shellmatch"
)]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// How long an idle player may sit in the matching room, in seconds.
    #[arg(long, default_value_t = 300)]
    wait_timeout: u64,

    /// Shell to run for matched players (defaults to the system shell).
    #[arg(long)]
    shell: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shellmatch_server=info".into()),
        )
        .init();

    let args = Args::parse();
    let wait_budget = Duration::from_secs(args.wait_timeout);

    let (room, handle) = MatchRoom::new();
    tokio::spawn(room.run());

    let relay = Arc::new(GameRelay::new(Arc::new(PtyShellProvider::new(args.shell))));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind TCP listener");

    tracing::info!("shellmatch-server listening on {}", addr);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let room = handle.clone();
                let relay = relay.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, room, relay, wait_budget).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}
