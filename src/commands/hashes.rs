//! Hash commands, backed by an object dict.

use super::handler::{
    count_reply, key_arg, typed_mut, typed_or_create, CommandError, CommandResult, Context,
};
use crate::protocol::EncodeData;
use crate::storage::object::Object;
use bytes::Bytes;

/// HSET key field value [field value ...]
pub(super) fn hset(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    if args.len() % 2 != 0 {
        return Err(CommandError::WrongArity("hset"));
    }

    let key = key_arg(&args[1]);
    let hash = typed_or_create(ctx.db, &key, Object::as_hash_mut, Object::new_hash)?;

    let mut created = 0;
    for pair in args[2..].chunks_exact(2) {
        if hash.replace(Object::from(&pair[0]), Object::from(&pair[1])) {
            created += 1;
        }
    }

    ctx.mark_dirty((args.len() / 2 - 1) as u64);
    Ok(count_reply(created))
}

/// HGET key field
pub(super) fn hget(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let value = typed_mut(ctx.db, &key_arg(&args[1]), Object::as_hash_mut)?
        .and_then(|hash| hash.get(&Object::from(&args[2])))
        .and_then(Object::to_reply);
    Ok(value.unwrap_or_else(EncodeData::null))
}

/// HDEL key field [field ...]
pub(super) fn hdel(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let key = key_arg(&args[1]);
    let Some(hash) = typed_mut(ctx.db, &key, Object::as_hash_mut)? else {
        return Ok(count_reply(0));
    };

    let removed = args[2..]
        .iter()
        .filter(|field| hash.delete(&Object::from(*field)).is_ok())
        .count();
    let emptied = hash.is_empty();

    if emptied {
        ctx.db.remove(&key);
    }
    ctx.mark_dirty(removed as u64);
    Ok(count_reply(removed))
}

/// HLEN key
pub(super) fn hlen(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let len = typed_mut(ctx.db, &key_arg(&args[1]), Object::as_hash_mut)?
        .map_or(0, |hash| hash.len());
    Ok(count_reply(len))
}

/// HGETALL key
pub(super) fn hgetall(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let mut out = Vec::new();
    if let Some(hash) = typed_mut(ctx.db, &key_arg(&args[1]), Object::as_hash_mut)? {
        for (field, value) in hash.iter() {
            if let (Some(field), Some(value)) = (field.to_reply(), value.to_reply()) {
                out.push(field);
                out.push(value);
            }
        }
    }
    Ok(EncodeData::multi_bulk(out))
}

#[cfg(test)]
mod tests {
    use crate::commands::handler::test_support::*;
    use crate::protocol::EncodeData;

    #[test]
    fn test_hset_hget() {
        let (mut server, mut client) = fresh();
        assert_eq!(
            run(&mut server, &mut client, "HSET user name ariel age 30"),
            EncodeData::integer(2)
        );
        assert_eq!(run(&mut server, &mut client, "HSET user age 31"), EncodeData::integer(0));
        assert_eq!(run(&mut server, &mut client, "HGET user age"), EncodeData::bulk("31"));
        assert_eq!(run(&mut server, &mut client, "HGET user nope"), EncodeData::null());
        assert_eq!(run(&mut server, &mut client, "HGET nope f"), EncodeData::null());
    }

    #[test]
    fn test_hset_odd_pairs() {
        let (mut server, mut client) = fresh();
        assert_eq!(
            run(&mut server, &mut client, "HSET h f1 v1 f2"),
            EncodeData::error("ERR wrong number of arguments for 'hset' command")
        );
        assert_eq!(run(&mut server, &mut client, "EXISTS h"), EncodeData::integer(0));
    }

    #[test]
    fn test_hdel_and_hlen() {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "HSET h a 1 b 2");
        assert_eq!(run(&mut server, &mut client, "HLEN h"), EncodeData::integer(2));
        assert_eq!(run(&mut server, &mut client, "HDEL h a zz"), EncodeData::integer(1));
        assert_eq!(run(&mut server, &mut client, "HDEL h b"), EncodeData::integer(1));
        assert_eq!(run(&mut server, &mut client, "EXISTS h"), EncodeData::integer(0));
    }

    #[test]
    fn test_hgetall_pairs() {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "HSET h a 1 b 2");
        assert_eq!(
            sorted(run(&mut server, &mut client, "HGETALL h")),
            vec!["1", "2", "a", "b"]
        );
        assert_eq!(run(&mut server, &mut client, "HGETALL nope"), bulks(&[]));
    }
}
