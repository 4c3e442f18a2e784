//! Server and connection commands.

use super::handler::{count_reply, parse_int, CommandError, CommandResult, Context};
use crate::protocol::EncodeData;
use bytes::Bytes;
use tracing::info;

/// PING [message]
pub(super) fn ping(_ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    match args.len() {
        1 => Ok(EncodeData::pong()),
        2 => Ok(EncodeData::bulk(args[1].clone())),
        _ => Err(CommandError::WrongArity("ping")),
    }
}

/// ECHO message
pub(super) fn echo(_ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    Ok(EncodeData::bulk(args[1].clone()))
}

/// SELECT index
pub(super) fn select(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let index = parse_int(&args[1])?;
    if index < 0 || index as usize >= ctx.db_count {
        return Err(CommandError::DbIndexOutOfRange);
    }
    *ctx.selected = index as usize;
    Ok(EncodeData::ok())
}

/// DBSIZE
pub(super) fn dbsize(ctx: &mut Context<'_>, _args: &[Bytes]) -> CommandResult {
    Ok(count_reply(ctx.db.len()))
}

/// FLUSHDB
pub(super) fn flushdb(ctx: &mut Context<'_>, _args: &[Bytes]) -> CommandResult {
    let removed = ctx.db.flush();
    info!(db = ctx.db.id(), removed, "database flushed");
    ctx.mark_dirty(removed.max(1) as u64);
    Ok(EncodeData::ok())
}

/// COMMAND (replies with the number of registered commands)
pub(super) fn command(ctx: &mut Context<'_>, _args: &[Bytes]) -> CommandResult {
    Ok(count_reply(ctx.command_count))
}

#[cfg(test)]
mod tests {
    use crate::commands::handler::test_support::*;
    use crate::commands::COMMAND_TABLE;
    use crate::protocol::EncodeData;

    #[test]
    fn test_ping_and_echo() {
        let (mut server, mut client) = fresh();
        assert_eq!(run(&mut server, &mut client, "PING"), EncodeData::pong());
        assert_eq!(
            run(&mut server, &mut client, "ping hello"),
            EncodeData::bulk("hello")
        );
        assert_eq!(
            run(&mut server, &mut client, "ECHO hi"),
            EncodeData::bulk("hi")
        );
        assert!(run(&mut server, &mut client, "PING a b").is_error());
    }

    #[test]
    fn test_select_isolates_databases() {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "SET k zero");
        assert_eq!(run(&mut server, &mut client, "SELECT 1"), EncodeData::ok());
        assert_eq!(run(&mut server, &mut client, "GET k"), EncodeData::null());
        assert_eq!(client.db, 1);

        run(&mut server, &mut client, "SELECT 0");
        assert_eq!(run(&mut server, &mut client, "GET k"), EncodeData::bulk("zero"));
    }

    #[test]
    fn test_select_out_of_range() {
        let (mut server, mut client) = fresh();
        assert_eq!(
            run(&mut server, &mut client, "SELECT 4"),
            EncodeData::error("ERR DB index is out of range")
        );
        assert!(run(&mut server, &mut client, "SELECT -1").is_error());
        assert!(run(&mut server, &mut client, "SELECT x").is_error());
        assert_eq!(client.db, 0);
    }

    #[test]
    fn test_dbsize_and_flushdb() {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "SET a 1");
        run(&mut server, &mut client, "SADD s x");
        assert_eq!(run(&mut server, &mut client, "DBSIZE"), EncodeData::integer(2));
        assert_eq!(run(&mut server, &mut client, "FLUSHDB"), EncodeData::ok());
        assert_eq!(run(&mut server, &mut client, "DBSIZE"), EncodeData::integer(0));
    }

    #[test]
    fn test_command_count() {
        let (mut server, mut client) = fresh();
        assert_eq!(
            run(&mut server, &mut client, "COMMAND"),
            EncodeData::integer(COMMAND_TABLE.len() as i64)
        );
    }
}
