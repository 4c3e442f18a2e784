//! String commands.

use super::handler::{key_arg, parse_int, CommandError, CommandResult, Context};
use crate::protocol::EncodeData;
use crate::storage::object::Object;
use crate::storage::sds::Sds;
use bytes::Bytes;

/// SET key value
pub(super) fn set(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    ctx.db
        .set(key_arg(&args[1]), Object::string_from_bytes(&args[2]));
    ctx.mark_dirty(1);
    Ok(EncodeData::ok())
}

/// GET key
pub(super) fn get(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    match ctx.db.lookup(&key_arg(&args[1])) {
        None => Ok(EncodeData::null()),
        Some(value) => value.to_reply().ok_or(CommandError::WrongType),
    }
}

/// INCR key
pub(super) fn incr(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    incr_by(ctx, &args[1], 1)
}

/// INCRBY key increment
pub(super) fn incrby(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let delta = parse_int(&args[2])?;
    incr_by(ctx, &args[1], delta)
}

/// DECR key
pub(super) fn decr(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    incr_by(ctx, &args[1], -1)
}

/// DECRBY key decrement
pub(super) fn decrby(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let delta = parse_int(&args[2])?
        .checked_neg()
        .ok_or(CommandError::Overflow)?;
    incr_by(ctx, &args[1], delta)
}

/// Adds `delta` to the integer at `key`. The key keeps its deadline.
fn incr_by(ctx: &mut Context<'_>, key: &Bytes, delta: i64) -> CommandResult {
    let key = key_arg(key);

    let updated = match ctx.db.lookup_mut(&key) {
        Some(value) => {
            if !value.is_string() {
                return Err(CommandError::WrongType);
            }
            let current = value.to_i64().ok_or(CommandError::NotInteger)?;
            let next = current.checked_add(delta).ok_or(CommandError::Overflow)?;
            *value = Object::Int(next);
            next
        }
        None => {
            ctx.db.set(key, Object::Int(delta));
            delta
        }
    };

    ctx.mark_dirty(1);
    Ok(EncodeData::integer(updated))
}

/// APPEND key value
pub(super) fn append(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let key = key_arg(&args[1]);

    let len = match ctx.db.lookup_mut(&key) {
        Some(value) => {
            let mut sds = match &mut *value {
                Object::Sds(sds) => std::mem::take(sds),
                other => Sds::new(&other.as_bytes().ok_or(CommandError::WrongType)?),
            };
            sds.cat(&args[2]);
            let len = sds.len();
            *value = Object::Sds(sds);
            len
        }
        None => {
            ctx.db.set(key, Object::Sds(Sds::new(&args[2])));
            args[2].len()
        }
    };

    ctx.mark_dirty(1);
    Ok(EncodeData::integer(len as i64))
}

/// STRLEN key
pub(super) fn strlen(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    match ctx.db.lookup(&key_arg(&args[1])) {
        None => Ok(EncodeData::integer(0)),
        Some(value) => value
            .as_bytes()
            .map(|bytes| EncodeData::integer(bytes.len() as i64))
            .ok_or(CommandError::WrongType),
    }
}
