//! Keyspace commands: deletion, introspection and expiry.

use super::handler::{count_reply, key_arg, parse_int, CommandError, CommandResult, Context};
use crate::protocol::EncodeData;
use crate::storage::db::{now_ms, Ttl};
use bytes::Bytes;

/// DEL key [key ...]
pub(super) fn del(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let removed = args[1..]
        .iter()
        .filter(|key| ctx.db.remove(&key_arg(key)))
        .count();
    ctx.mark_dirty(removed as u64);
    Ok(count_reply(removed))
}

/// EXISTS key [key ...]
pub(super) fn exists(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let found = args[1..]
        .iter()
        .filter(|key| ctx.db.exists(&key_arg(key)))
        .count();
    Ok(count_reply(found))
}

/// TYPE key
pub(super) fn key_type(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let name = ctx
        .db
        .lookup(&key_arg(&args[1]))
        .map_or("none", |value| value.type_name());
    Ok(EncodeData::status(name))
}

/// KEYS pattern
pub(super) fn keys(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let matched = ctx.db.keys(&args[1]);
    Ok(EncodeData::multi_bulk(
        matched.into_iter().map(EncodeData::bulk).collect(),
    ))
}

/// EXPIRE key seconds
pub(super) fn expire(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let seconds = parse_int(&args[2])?;
    let millis = seconds
        .checked_mul(1000)
        .ok_or(CommandError::InvalidExpire("expire"))?;
    expire_in(ctx, &args[1], millis, "expire")
}

/// PEXPIRE key milliseconds
pub(super) fn pexpire(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let millis = parse_int(&args[2])?;
    expire_in(ctx, &args[1], millis, "pexpire")
}

/// PEXPIREAT key unix-time-milliseconds
pub(super) fn pexpireat(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let at = parse_int(&args[2])?;
    expire_at(ctx, &args[1], at.max(0) as u64)
}

fn expire_in(
    ctx: &mut Context<'_>,
    key: &Bytes,
    millis: i64,
    command: &'static str,
) -> CommandResult {
    let at = if millis <= 0 {
        0
    } else {
        now_ms()
            .checked_add(millis as u64)
            .ok_or(CommandError::InvalidExpire(command))?
    };
    expire_at(ctx, key, at)
}

fn expire_at(ctx: &mut Context<'_>, key: &Bytes, at: u64) -> CommandResult {
    let key = key_arg(key);

    // A deadline in the past deletes the key right away.
    if at <= now_ms() {
        let removed = ctx.db.remove(&key);
        if removed {
            ctx.mark_dirty(1);
        }
        return Ok(EncodeData::integer(removed as i64));
    }

    let applied = ctx.db.set_expire(&key, at);
    if applied {
        ctx.mark_dirty(1);
    }
    Ok(EncodeData::integer(applied as i64))
}

/// TTL key
pub(super) fn ttl(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    Ok(ttl_reply(ctx.db.ttl_ms(&key_arg(&args[1])), |ms| {
        (ms + 500) / 1000
    }))
}

/// PTTL key
pub(super) fn pttl(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    Ok(ttl_reply(ctx.db.ttl_ms(&key_arg(&args[1])), |ms| ms))
}

fn ttl_reply(ttl: Ttl, scale: fn(u64) -> u64) -> EncodeData {
    match ttl {
        Ttl::Missing => EncodeData::integer(-2),
        Ttl::Persistent => EncodeData::integer(-1),
        Ttl::Remaining(ms) => EncodeData::integer(scale(ms) as i64),
    }
}

/// PERSIST key
pub(super) fn persist(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let removed = ctx.db.persist(&key_arg(&args[1]));
    if removed {
        ctx.mark_dirty(1);
    }
    Ok(EncodeData::integer(removed as i64))
}

#[cfg(test)]
mod tests {
    use crate::commands::handler::test_support::*;
    use crate::protocol::EncodeData;
    use crate::storage::db::now_ms;

    #[test]
    fn test_del_and_exists() {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "SET a 1");
        run(&mut server, &mut client, "RPUSH b x");

        assert_eq!(
            run(&mut server, &mut client, "EXISTS a b c"),
            EncodeData::integer(2)
        );
        assert_eq!(
            run(&mut server, &mut client, "DEL a b c"),
            EncodeData::integer(2)
        );
        assert_eq!(run(&mut server, &mut client, "EXISTS a"), EncodeData::integer(0));
    }

    #[test]
    fn test_type() {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "SET s v");
        run(&mut server, &mut client, "HSET h f v");
        run(&mut server, &mut client, "ZADD z 1 m");

        assert_eq!(run(&mut server, &mut client, "TYPE s"), EncodeData::status("string"));
        assert_eq!(run(&mut server, &mut client, "TYPE h"), EncodeData::status("hash"));
        assert_eq!(run(&mut server, &mut client, "TYPE z"), EncodeData::status("zset"));
        assert_eq!(run(&mut server, &mut client, "TYPE nope"), EncodeData::status("none"));
    }

    #[test]
    fn test_keys_pattern() {
        let (mut server, mut client) = fresh();
        for key in ["user:1", "user:2", "session:1"] {
            run(&mut server, &mut client, &format!("SET {key} v"));
        }

        let reply = run(&mut server, &mut client, "KEYS user:*");
        let EncodeData::MultiBulk(Some(items)) = reply else {
            panic!("expected multibulk, got {reply:?}");
        };
        let mut names: Vec<String> = items.iter().map(|item| item.to_string()).collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|name| name.contains("user:")));
    }

    #[test]
    fn test_expire_ttl_persist() {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "SET k v");

        assert_eq!(run(&mut server, &mut client, "TTL k"), EncodeData::integer(-1));
        assert_eq!(run(&mut server, &mut client, "TTL nope"), EncodeData::integer(-2));

        assert_eq!(run(&mut server, &mut client, "EXPIRE k 100"), EncodeData::integer(1));
        assert_eq!(run(&mut server, &mut client, "TTL k"), EncodeData::integer(100));
        let EncodeData::Integer(ms) = run(&mut server, &mut client, "PTTL k") else {
            panic!("PTTL should reply with an integer");
        };
        assert!(ms > 99_000 && ms <= 100_000);

        assert_eq!(run(&mut server, &mut client, "PERSIST k"), EncodeData::integer(1));
        assert_eq!(run(&mut server, &mut client, "TTL k"), EncodeData::integer(-1));
        assert_eq!(run(&mut server, &mut client, "PERSIST k"), EncodeData::integer(0));
    }

    #[test]
    fn test_expire_missing_key() {
        let (mut server, mut client) = fresh();
        assert_eq!(run(&mut server, &mut client, "EXPIRE nope 10"), EncodeData::integer(0));
    }

    #[test]
    fn test_non_positive_expire_deletes() {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "SET k v");
        assert_eq!(run(&mut server, &mut client, "PEXPIRE k 0"), EncodeData::integer(1));
        assert_eq!(run(&mut server, &mut client, "EXISTS k"), EncodeData::integer(0));
    }

    #[test]
    fn test_set_clears_ttl() {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "SET k v");
        run(&mut server, &mut client, "EXPIRE k 100");
        run(&mut server, &mut client, "SET k w");
        assert_eq!(run(&mut server, &mut client, "TTL k"), EncodeData::integer(-1));
    }

    #[test]
    fn test_expire_rejects_garbage() {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "SET k v");
        assert_eq!(
            run(&mut server, &mut client, "EXPIRE k soon"),
            EncodeData::error("ERR value is not an integer or out of range")
        );
        assert!(run(&mut server, &mut client, "EXPIRE k 9223372036854775807").is_error());
    }

    #[test]
    fn test_pexpireat() {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "SET k v");
        run(&mut server, &mut client, "SET old v");

        let at = now_ms() + 50_000;
        assert_eq!(
            run(&mut server, &mut client, &format!("PEXPIREAT k {at}")),
            EncodeData::integer(1)
        );
        assert_eq!(run(&mut server, &mut client, "TTL k"), EncodeData::integer(50));

        assert_eq!(
            run(&mut server, &mut client, "PEXPIREAT old 1000"),
            EncodeData::integer(1)
        );
        assert_eq!(run(&mut server, &mut client, "EXISTS old"), EncodeData::integer(0));
        assert_eq!(
            run(&mut server, &mut client, "PEXPIREAT missing 1000"),
            EncodeData::integer(0)
        );
    }
}
