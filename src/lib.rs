//! # QuillKV - An In-Memory Data Structure Server
//!
//! QuillKV keeps strings, lists, sets, hashes and sorted sets in memory and
//! serves them over the RESP wire protocol, so any Redis client can talk to
//! it. Dirty commands are appended to a replay log and re-executed at
//! startup.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                               QuillKV                                │
//! │                                                                      │
//! │  ┌─────────────┐   ┌──────────────┐   ┌───────────────────────────┐  │
//! │  │ TcpListener │──>│ Connection   │──>│ Server (Arc<Mutex<..>>)   │  │
//! │  │ (main.rs)   │   │ RespParser   │   │  CommandTable ─> dispatch │  │
//! │  └─────────────┘   └──────────────┘   │  Vec<Database>            │  │
//! │                                       │  ReplayLog ──> file       │  │
//! │                                       └─────────────▲─────────────┘  │
//! │                                                     │ cron()         │
//! │                                       ┌─────────────┴─────────────┐  │
//! │                                       │ ExpirySweeper (Tokio task)│  │
//! │                                       └───────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: RESP parsing, encoding and blocking codec
//! - [`storage`]: dynamic strings, the incremental-rehash dict, skip list,
//!   sorted sets, value objects and databases
//! - [`commands`]: the command table and per-family handlers
//! - [`server`]: shared server state and command execution
//! - [`persistence`]: the command replay log
//! - [`connection`]: per-client async tasks
//! - [`config`]: command-line and environment configuration
//!
//! ## Quick Start
//!
//! ```ignore
//! use quillkv::connection::{handle_connection, ConnectionStats};
//! use quillkv::server::Server;
//! use quillkv::storage::start_expiry_sweeper;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = Server::new(16).into_shared();
//!     let _sweeper = start_expiry_sweeper(server.clone());
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         tokio::spawn(handle_connection(stream, addr, server.clone(), stats.clone()));
//!     }
//! }
//! ```

pub mod commands;
pub mod config;
pub mod connection;
pub mod persistence;
pub mod protocol;
pub mod server;
pub mod storage;

pub use commands::{CommandError, CommandKind, CommandTable};
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use persistence::{PersistenceError, ReplayLog};
pub use protocol::{Decoder, EncodeData, Encoder, ParseError, RespParser};
pub use server::{lock, ClientState, Server, SharedServer};
pub use storage::{start_expiry_sweeper, Database, Object};

/// The default port (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of QuillKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
