//! Command Dispatch
//!
//! ```text
//!  args ──> CommandTable::lookup ──> arity check ──> dispatch() ──> family handler
//!                                                                      │
//!                                                          Context { db, dirty, .. }
//! ```
//!
//! Handlers are plain functions `fn(&mut Context, &[Bytes]) -> CommandResult`.
//! `args[0]` is always the command name. A handler that changes the keyspace
//! bumps the dirty counter through [`Context::mark_dirty`]; the server uses
//! that to decide what goes to the replay log.

use crate::commands::table::{CommandKind, CommandSpec};
use crate::commands::{admin, hashes, keys, lists, sets, strings, zsets};
use crate::protocol::EncodeData;
use crate::storage::db::Database;
use crate::storage::object::Object;
use bytes::Bytes;
use thiserror::Error;

/// Per-command failures. The `Display` text is the RESP error line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR value is not a valid float")]
    NotFloat,

    #[error("ERR min or max is not a float")]
    RangeNotFloat,

    #[error("ERR resulting score is not a number (NaN)")]
    NanScore,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpire(&'static str),

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR DB index is out of range")]
    DbIndexOutOfRange,

    #[error("ERR empty command")]
    EmptyCommand,
}

impl From<CommandError> for EncodeData {
    fn from(err: CommandError) -> Self {
        EncodeData::Error(err.to_string())
    }
}

pub type CommandResult = Result<EncodeData, CommandError>;

/// Everything a handler may touch.
#[derive(Debug)]
pub struct Context<'a> {
    /// The client's selected database
    pub db: &'a mut Database,
    /// The client's selected database index (`SELECT` rewrites it)
    pub selected: &'a mut usize,
    pub db_count: usize,
    pub command_count: usize,
    dirty: &'a mut u64,
}

impl<'a> Context<'a> {
    pub fn new(
        db: &'a mut Database,
        selected: &'a mut usize,
        db_count: usize,
        command_count: usize,
        dirty: &'a mut u64,
    ) -> Self {
        Self {
            db,
            selected,
            db_count,
            command_count,
            dirty,
        }
    }

    /// Records `changes` keyspace modifications.
    pub fn mark_dirty(&mut self, changes: u64) {
        *self.dirty += changes;
    }
}

/// Runs an arity-checked command.
pub fn dispatch(spec: &CommandSpec, ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    use CommandKind::*;

    match spec.kind {
        Ping => admin::ping(ctx, args),
        Echo => admin::echo(ctx, args),
        Select => admin::select(ctx, args),
        DbSize => admin::dbsize(ctx, args),
        FlushDb => admin::flushdb(ctx, args),
        Command => admin::command(ctx, args),
        Quit => Ok(EncodeData::ok()),

        Del => keys::del(ctx, args),
        Exists => keys::exists(ctx, args),
        Type => keys::key_type(ctx, args),
        Keys => keys::keys(ctx, args),
        Expire => keys::expire(ctx, args),
        PExpire => keys::pexpire(ctx, args),
        PExpireAt => keys::pexpireat(ctx, args),
        Ttl => keys::ttl(ctx, args),
        PTtl => keys::pttl(ctx, args),
        Persist => keys::persist(ctx, args),

        Set => strings::set(ctx, args),
        Get => strings::get(ctx, args),
        Incr => strings::incr(ctx, args),
        IncrBy => strings::incrby(ctx, args),
        Decr => strings::decr(ctx, args),
        DecrBy => strings::decrby(ctx, args),
        Append => strings::append(ctx, args),
        StrLen => strings::strlen(ctx, args),

        LPush => lists::lpush(ctx, args),
        RPush => lists::rpush(ctx, args),
        LPop => lists::lpop(ctx, args),
        RPop => lists::rpop(ctx, args),
        LLen => lists::llen(ctx, args),
        LRange => lists::lrange(ctx, args),

        SAdd => sets::sadd(ctx, args),
        SRem => sets::srem(ctx, args),
        SIsMember => sets::sismember(ctx, args),
        SCard => sets::scard(ctx, args),
        SMembers => sets::smembers(ctx, args),

        HSet => hashes::hset(ctx, args),
        HGet => hashes::hget(ctx, args),
        HDel => hashes::hdel(ctx, args),
        HLen => hashes::hlen(ctx, args),
        HGetAll => hashes::hgetall(ctx, args),

        ZAdd => zsets::zadd(ctx, args),
        ZScore => zsets::zscore(ctx, args),
        ZRank => zsets::zrank(ctx, args),
        ZRem => zsets::zrem(ctx, args),
        ZCard => zsets::zcard(ctx, args),
        ZRange => zsets::zrange(ctx, args),
        ZRangeByScore => zsets::zrangebyscore(ctx, args),
        ZCount => zsets::zcount(ctx, args),
        ZIncrBy => zsets::zincrby(ctx, args),
        ZRemRangeByScore => zsets::zremrangebyscore(ctx, args),
        ZRemRangeByRank => zsets::zremrangebyrank(ctx, args),
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Keyspace key for an argument.
pub(crate) fn key_arg(arg: &Bytes) -> Object {
    Object::from(arg)
}

pub(crate) fn parse_int(arg: &[u8]) -> Result<i64, CommandError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CommandError::NotInteger)
}

/// Parses a score. Accepts `inf`, `+inf` and `-inf`; rejects NaN.
pub(crate) fn parse_float(arg: &[u8]) -> Result<f64, CommandError> {
    let text = std::str::from_utf8(arg).map_err(|_| CommandError::NotFloat)?;
    let value = match text.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        other => other.parse::<f64>().map_err(|_| CommandError::NotFloat)?,
    };
    if value.is_nan() {
        return Err(CommandError::NotFloat);
    }
    Ok(value)
}

// ============================================================================
// Typed value access
// ============================================================================

/// The value at `key` viewed through `project`.
///
/// # Returns
///
/// - `Ok(None)` if the key does not exist
/// - `Err(WrongType)` if it holds a different kind of value
pub(crate) fn typed_mut<'a, T: ?Sized>(
    db: &'a mut Database,
    key: &Object,
    project: fn(&mut Object) -> Option<&mut T>,
) -> Result<Option<&'a mut T>, CommandError> {
    match db.lookup_mut(key) {
        None => Ok(None),
        Some(value) => project(value).map(Some).ok_or(CommandError::WrongType),
    }
}

/// Like [`typed_mut`] but creates the value with `create` when the key is
/// missing.
pub(crate) fn typed_or_create<'a, T: ?Sized>(
    db: &'a mut Database,
    key: &Object,
    project: fn(&mut Object) -> Option<&mut T>,
    create: fn() -> Object,
) -> Result<&'a mut T, CommandError> {
    if !db.exists(key) {
        let owned = key.dup_string().ok_or(CommandError::WrongType)?;
        db.set(owned, create());
    }
    typed_mut(db, key, project)?.ok_or(CommandError::NoSuchKey)
}

/// Integer reply from a count.
pub(crate) fn count_reply(n: usize) -> EncodeData {
    EncodeData::integer(n as i64)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_error_text() {
        assert_eq!(
            EncodeData::from(CommandError::WrongArity("get")),
            EncodeData::error("ERR wrong number of arguments for 'get' command")
        );
        assert_eq!(
            CommandError::WrongType.to_string(),
            "WRONGTYPE Operation against a key holding the wrong kind of value"
        );
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float(b"1.5"), Ok(1.5));
        assert_eq!(parse_float(b"-inf"), Ok(f64::NEG_INFINITY));
        assert_eq!(parse_float(b"+inf"), Ok(f64::INFINITY));
        assert_eq!(parse_float(b"nan"), Err(CommandError::NotFloat));
        assert_eq!(parse_float(b"abc"), Err(CommandError::NotFloat));
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(b"-12"), Ok(-12));
        assert_eq!(parse_int(b"1.0"), Err(CommandError::NotInteger));
        assert_eq!(parse_int(b"99999999999999999999"), Err(CommandError::NotInteger));
    }

    #[test]
    fn test_unknown_and_arity() {
        let (mut server, mut client) = fresh();
        assert_eq!(
            run(&mut server, &mut client, "NOSUCH a"),
            EncodeData::error("ERR unknown command 'NOSUCH'")
        );
        assert_eq!(
            run(&mut server, &mut client, "GET"),
            EncodeData::error("ERR wrong number of arguments for 'get' command")
        );
    }

    #[test]
    fn test_wrong_type_across_families() {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "LPUSH mylist a");

        let wrong = EncodeData::from(CommandError::WrongType);
        for line in [
            "GET mylist",
            "INCR mylist",
            "SADD mylist x",
            "HGET mylist f",
            "ZADD mylist 1 m",
            "APPEND mylist x",
        ] {
            assert_eq!(run(&mut server, &mut client, line), wrong, "{line}");
        }
    }
}
