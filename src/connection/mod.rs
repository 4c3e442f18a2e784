//! Client Connections
//!
//! Each accepted socket gets its own Tokio task running a
//! [`ConnectionHandler`]. The handler is generic over the stream, so tests
//! drive it with in-memory mocks as well as real TCP sockets.
//!
//! ```text
//!   TcpListener (main.rs)
//!        │ accept()
//!        ▼
//!   tokio::spawn(handle_connection(..))
//!        │
//!        ▼
//!   read ──> parse ──> lock(server).execute ──> reply
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use quillkv::connection::{handle_connection, ConnectionStats};
//! use quillkv::server::Server;
//! use std::sync::Arc;
//!
//! let server = Server::new(16).into_shared();
//! let stats = Arc::new(ConnectionStats::new());
//!
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, server.clone(), stats.clone()));
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
