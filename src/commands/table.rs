//! Command Table
//!
//! [`COMMAND_TABLE`] lists every command with its arity. At startup the
//! entries are loaded into a [`Dict`] mapping lowercase name →
//! `Object::Command(spec)`; lookups lowercase the requested name first, so
//! `get`, `GET` and `Get` all resolve to the same spec.
//!
//! Arity counts the command name: `n` means exactly `n` arguments, `-n`
//! means at least `n`.

use crate::storage::dict::Dict;
use crate::storage::object::{Object, ObjectDict, ObjectDictType};
use crate::storage::sds::Sds;

/// Every command the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandKind {
    // server / connection
    Ping,
    Echo,
    Select,
    DbSize,
    FlushDb,
    Command,
    Quit,
    // keys
    Del,
    Exists,
    Type,
    Keys,
    Expire,
    PExpire,
    PExpireAt,
    Ttl,
    PTtl,
    Persist,
    // strings
    Set,
    Get,
    Incr,
    IncrBy,
    Decr,
    DecrBy,
    Append,
    StrLen,
    // lists
    LPush,
    RPush,
    LPop,
    RPop,
    LLen,
    LRange,
    // sets
    SAdd,
    SRem,
    SIsMember,
    SCard,
    SMembers,
    // hashes
    HSet,
    HGet,
    HDel,
    HLen,
    HGetAll,
    // sorted sets
    ZAdd,
    ZScore,
    ZRank,
    ZRem,
    ZCard,
    ZRange,
    ZRangeByScore,
    ZCount,
    ZIncrBy,
    ZRemRangeByScore,
    ZRemRangeByRank,
}

/// Static description of one command.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub kind: CommandKind,
    /// Lowercase wire name
    pub name: &'static str,
    /// Argument count including the name; negative means "at least"
    pub arity: i32,
}

impl CommandSpec {
    /// Does `argc` (including the name) satisfy this command's arity?
    pub fn accepts(&self, argc: usize) -> bool {
        if self.arity >= 0 {
            argc == self.arity as usize
        } else {
            argc >= self.arity.unsigned_abs() as usize
        }
    }
}

const fn spec(kind: CommandKind, name: &'static str, arity: i32) -> CommandSpec {
    CommandSpec { kind, name, arity }
}

/// Every command, in registration order.
pub const COMMAND_TABLE: &[CommandSpec] = &[
    // server / connection
    spec(CommandKind::Ping, "ping", -1),
    spec(CommandKind::Echo, "echo", 2),
    spec(CommandKind::Select, "select", 2),
    spec(CommandKind::DbSize, "dbsize", 1),
    spec(CommandKind::FlushDb, "flushdb", 1),
    spec(CommandKind::Command, "command", -1),
    spec(CommandKind::Quit, "quit", 1),
    // keys
    spec(CommandKind::Del, "del", -2),
    spec(CommandKind::Exists, "exists", -2),
    spec(CommandKind::Type, "type", 2),
    spec(CommandKind::Keys, "keys", 2),
    spec(CommandKind::Expire, "expire", 3),
    spec(CommandKind::PExpire, "pexpire", 3),
    spec(CommandKind::PExpireAt, "pexpireat", 3),
    spec(CommandKind::Ttl, "ttl", 2),
    spec(CommandKind::PTtl, "pttl", 2),
    spec(CommandKind::Persist, "persist", 2),
    // strings
    spec(CommandKind::Set, "set", 3),
    spec(CommandKind::Get, "get", 2),
    spec(CommandKind::Incr, "incr", 2),
    spec(CommandKind::IncrBy, "incrby", 3),
    spec(CommandKind::Decr, "decr", 2),
    spec(CommandKind::DecrBy, "decrby", 3),
    spec(CommandKind::Append, "append", 3),
    spec(CommandKind::StrLen, "strlen", 2),
    // lists
    spec(CommandKind::LPush, "lpush", -3),
    spec(CommandKind::RPush, "rpush", -3),
    spec(CommandKind::LPop, "lpop", 2),
    spec(CommandKind::RPop, "rpop", 2),
    spec(CommandKind::LLen, "llen", 2),
    spec(CommandKind::LRange, "lrange", 4),
    // sets
    spec(CommandKind::SAdd, "sadd", -3),
    spec(CommandKind::SRem, "srem", -3),
    spec(CommandKind::SIsMember, "sismember", 3),
    spec(CommandKind::SCard, "scard", 2),
    spec(CommandKind::SMembers, "smembers", 2),
    // hashes
    spec(CommandKind::HSet, "hset", -4),
    spec(CommandKind::HGet, "hget", 3),
    spec(CommandKind::HDel, "hdel", -3),
    spec(CommandKind::HLen, "hlen", 2),
    spec(CommandKind::HGetAll, "hgetall", 2),
    // sorted sets
    spec(CommandKind::ZAdd, "zadd", -4),
    spec(CommandKind::ZScore, "zscore", 3),
    spec(CommandKind::ZRank, "zrank", 3),
    spec(CommandKind::ZRem, "zrem", -3),
    spec(CommandKind::ZCard, "zcard", 2),
    spec(CommandKind::ZRange, "zrange", -4),
    spec(CommandKind::ZRangeByScore, "zrangebyscore", -4),
    spec(CommandKind::ZCount, "zcount", 4),
    spec(CommandKind::ZIncrBy, "zincrby", 4),
    spec(CommandKind::ZRemRangeByScore, "zremrangebyscore", 4),
    spec(CommandKind::ZRemRangeByRank, "zremrangebyrank", 4),
];

/// Name → command lookup table.
#[derive(Debug)]
pub struct CommandTable {
    dict: ObjectDict,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    pub fn new() -> Self {
        let mut dict = Dict::new(ObjectDictType);
        for spec in COMMAND_TABLE {
            dict.replace(Object::Str(spec.name.to_string()), Object::Command(spec));
        }
        Self { dict }
    }

    /// Resolves a command name case-insensitively.
    pub fn lookup(&mut self, name: &[u8]) -> Option<&'static CommandSpec> {
        let key = Object::Sds(Sds::new(&name.to_ascii_lowercase()));
        match self.dict.get(&key) {
            Some(Object::Command(spec)) => Some(*spec),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }
}
