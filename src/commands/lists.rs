//! List commands. Lists are `VecDeque<Object>`; an emptied list is removed
//! from the keyspace.

use super::handler::{
    count_reply, key_arg, parse_int, typed_mut, typed_or_create, CommandResult, Context,
};
use crate::protocol::EncodeData;
use crate::storage::object::Object;
use bytes::Bytes;
use std::collections::VecDeque;

#[derive(Clone, Copy)]
enum End {
    Head,
    Tail,
}

fn new_list() -> Object {
    Object::List(VecDeque::new())
}

/// LPUSH key element [element ...]
pub(super) fn lpush(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    push(ctx, args, End::Head)
}

/// RPUSH key element [element ...]
pub(super) fn rpush(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    push(ctx, args, End::Tail)
}

fn push(ctx: &mut Context<'_>, args: &[Bytes], end: End) -> CommandResult {
    let key = key_arg(&args[1]);
    let list = typed_or_create(ctx.db, &key, Object::as_list_mut, new_list)?;

    for element in &args[2..] {
        let element = Object::from(element);
        match end {
            End::Head => list.push_front(element),
            End::Tail => list.push_back(element),
        }
    }
    let len = list.len();

    ctx.mark_dirty((args.len() - 2) as u64);
    Ok(count_reply(len))
}

/// LPOP key
pub(super) fn lpop(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    pop(ctx, args, End::Head)
}

/// RPOP key
pub(super) fn rpop(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    pop(ctx, args, End::Tail)
}

fn pop(ctx: &mut Context<'_>, args: &[Bytes], end: End) -> CommandResult {
    let key = key_arg(&args[1]);
    let Some(list) = typed_mut(ctx.db, &key, Object::as_list_mut)? else {
        return Ok(EncodeData::null());
    };

    let popped = match end {
        End::Head => list.pop_front(),
        End::Tail => list.pop_back(),
    };
    let emptied = list.is_empty();

    if emptied {
        ctx.db.remove(&key);
    }
    match popped {
        Some(element) => {
            ctx.mark_dirty(1);
            Ok(element.to_reply().unwrap_or_else(EncodeData::null))
        }
        None => Ok(EncodeData::null()),
    }
}

/// LLEN key
pub(super) fn llen(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let len = typed_mut(ctx.db, &key_arg(&args[1]), Object::as_list_mut)?
        .map_or(0, |list| list.len());
    Ok(count_reply(len))
}

/// LRANGE key start stop
pub(super) fn lrange(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let start = parse_int(&args[2])?;
    let stop = parse_int(&args[3])?;

    let Some(list) = typed_mut(ctx.db, &key_arg(&args[1]), Object::as_list_mut)? else {
        return Ok(EncodeData::multi_bulk(Vec::new()));
    };

    let len = list.len() as i64;

    // Convert negative indices
    let mut first = if start < 0 { len + start } else { start };
    let mut last = if stop < 0 { len + stop } else { stop };

    // Clamp to valid range
    if first < 0 {
        first = 0;
    }
    if last >= len {
        last = len - 1;
    }
    if first > last || first >= len {
        return Ok(EncodeData::multi_bulk(Vec::new()));
    }

    let items = list
        .iter()
        .skip(first as usize)
        .take((last - first + 1) as usize)
        .filter_map(Object::to_reply)
        .collect();
    Ok(EncodeData::multi_bulk(items))
}
