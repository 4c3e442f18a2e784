//! Persistence
//!
//! The only persistence format is the command replay log: an append-only
//! file of RESP command frames, re-executed at startup.

pub mod replay;

pub use replay::{PersistenceError, ReplayLog};
