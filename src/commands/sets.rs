//! Set commands, backed by a `Dict<Object, ()>`.

use super::handler::{count_reply, key_arg, typed_mut, typed_or_create, CommandResult, Context};
use crate::protocol::EncodeData;
use crate::storage::object::Object;
use bytes::Bytes;

/// SADD key member [member ...]
pub(super) fn sadd(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let key = key_arg(&args[1]);
    let set = typed_or_create(ctx.db, &key, Object::as_set_mut, Object::new_set)?;

    let added = args[2..]
        .iter()
        .filter(|member| set.add(Object::from(*member), ()).is_ok())
        .count();

    ctx.mark_dirty(added as u64);
    Ok(count_reply(added))
}

/// SREM key member [member ...]
pub(super) fn srem(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let key = key_arg(&args[1]);
    let Some(set) = typed_mut(ctx.db, &key, Object::as_set_mut)? else {
        return Ok(count_reply(0));
    };

    let removed = args[2..]
        .iter()
        .filter(|member| set.delete(&Object::from(*member)).is_ok())
        .count();
    let emptied = set.is_empty();

    if emptied {
        ctx.db.remove(&key);
    }
    ctx.mark_dirty(removed as u64);
    Ok(count_reply(removed))
}

/// SISMEMBER key member
pub(super) fn sismember(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let found = typed_mut(ctx.db, &key_arg(&args[1]), Object::as_set_mut)?
        .is_some_and(|set| set.contains_key(&Object::from(&args[2])));
    Ok(EncodeData::integer(found as i64))
}

/// SCARD key
pub(super) fn scard(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let len = typed_mut(ctx.db, &key_arg(&args[1]), Object::as_set_mut)?
        .map_or(0, |set| set.len());
    Ok(count_reply(len))
}

/// SMEMBERS key
pub(super) fn smembers(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let members = match typed_mut(ctx.db, &key_arg(&args[1]), Object::as_set_mut)? {
        Some(set) => set.iter().filter_map(|(member, _)| member.to_reply()).collect(),
        None => Vec::new(),
    };
    Ok(EncodeData::multi_bulk(members))
}
