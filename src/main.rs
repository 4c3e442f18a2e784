//! QuillKV server binary.
//!
//! Loads the replay log, then serves RESP clients until Ctrl+C.

use anyhow::Context as _;
use clap::Parser;
use quillkv::config::Config;
use quillkv::connection::{handle_connection, ConnectionStats};
use quillkv::persistence::ReplayLog;
use quillkv::server::{Server, SharedServer};
use quillkv::storage::start_expiry_sweeper;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
   ____        _ _ _ _  ____   __
  / __ \__  __(_) | | |/ /\ \ / /
 / / / / / / / / | | ' /  \ V /
/ /_/ / /_/ / / | | . \   | |
\___\_\__,_/_/|_|_|_|\_\  |_|

QuillKV v{} - in-memory data structure server
──────────────────────────────────────────────
Listening on {} with {} databases
Use Ctrl+C to shut down.
"#,
        quillkv::VERSION,
        config.bind_address(),
        config.databases
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    print_banner(&config);

    let mut server = Server::new(config.databases);
    if let Some(path) = config.replay_log_path() {
        let loaded = ReplayLog::load(path, &mut server)
            .with_context(|| format!("failed to load replay log {}", path.display()))?;
        info!(commands = loaded, keys = server.key_count(), "state restored");

        let log = ReplayLog::open(path)
            .with_context(|| format!("failed to open replay log {}", path.display()))?;
        server.attach_replay_log(log);
    }

    let server = server.into_shared();
    let _sweeper = start_expiry_sweeper(Arc::clone(&server));
    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!(address = %config.bind_address(), "listening");

    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!(error = %e, "failed to listen for Ctrl+C"),
        }
    };

    tokio::select! {
        _ = accept_loop(listener, server, Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    info!(
        connections = stats
            .connections_accepted
            .load(std::sync::atomic::Ordering::Relaxed),
        "server shutdown complete"
    );
    Ok(())
}

async fn accept_loop(listener: TcpListener, server: SharedServer, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    error!(client = %addr, error = %e, "failed to set TCP_NODELAY");
                }
                tokio::spawn(handle_connection(
                    stream,
                    addr,
                    Arc::clone(&server),
                    Arc::clone(&stats),
                ));
            }
            Err(e) => {
                error!(error = %e, "failed to accept connection");
            }
        }
    }
}
