//! Command Layer
//!
//! Receives parsed command frames, resolves them through the command table
//! and executes them against the client's selected database.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RespParser     │  (protocol module)
//! └────────┬────────┘
//!          │ Vec<Bytes>
//!          ▼
//! ┌─────────────────┐
//! │  CommandTable   │  name → CommandSpec, arity check
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │  dispatch()     │  keys / strings / lists / sets / hashes / zsets / admin
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │  Database       │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - Server: `PING`, `ECHO`, `SELECT`, `DBSIZE`, `FLUSHDB`, `COMMAND`, `QUIT`
//! - Keys: `DEL`, `EXISTS`, `TYPE`, `KEYS`, `EXPIRE`, `PEXPIRE`,
//!   `PEXPIREAT`, `TTL`, `PTTL`, `PERSIST`
//! - Strings: `SET`, `GET`, `INCR`, `INCRBY`, `DECR`, `DECRBY`, `APPEND`,
//!   `STRLEN`
//! - Lists: `LPUSH`, `RPUSH`, `LPOP`, `RPOP`, `LLEN`, `LRANGE`
//! - Sets: `SADD`, `SREM`, `SISMEMBER`, `SCARD`, `SMEMBERS`
//! - Hashes: `HSET`, `HGET`, `HDEL`, `HLEN`, `HGETALL`
//! - Sorted sets: `ZADD`, `ZSCORE`, `ZRANK`, `ZREM`, `ZCARD`, `ZRANGE`,
//!   `ZRANGEBYSCORE`, `ZCOUNT`, `ZINCRBY`, `ZREMRANGEBYSCORE`,
//!   `ZREMRANGEBYRANK`

pub mod handler;
pub mod table;

mod admin;
mod hashes;
mod keys;
mod lists;
mod sets;
mod strings;
mod zsets;

pub use handler::{dispatch, CommandError, CommandResult, Context};
pub use table::{CommandKind, CommandSpec, CommandTable, COMMAND_TABLE};
