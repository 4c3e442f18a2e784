//! Sorted-set commands.
//!
//! Score bounds accept `-inf` / `+inf` and a leading `(` for an exclusive
//! end, e.g. `ZRANGEBYSCORE key (1 +inf`.

use super::handler::{
    count_reply, key_arg, parse_float, parse_int, typed_mut, typed_or_create, CommandError,
    CommandResult, Context,
};
use crate::protocol::EncodeData;
use crate::storage::object::Object;
use crate::storage::sds::Sds;
use crate::storage::zset::{format_score, ZAddOutcome};
use crate::storage::zskiplist::ZRangeSpec;
use bytes::Bytes;

/// ZADD key score member [score member ...]
pub(super) fn zadd(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    if args.len() % 2 != 0 {
        return Err(CommandError::Syntax);
    }

    // Every score is validated before anything is inserted.
    let pairs = args[2..]
        .chunks_exact(2)
        .map(|pair| parse_float(&pair[0]).map(|score| (score, Sds::new(&pair[1]))))
        .collect::<Result<Vec<_>, _>>()?;

    let key = key_arg(&args[1]);
    let zset = typed_or_create(ctx.db, &key, Object::as_zset_mut, Object::new_sorted_set)?;

    let mut added = 0;
    let mut changed = 0;
    for (score, member) in pairs {
        match zset.add(member, score) {
            ZAddOutcome::Added => added += 1,
            ZAddOutcome::Updated => changed += 1,
            ZAddOutcome::Unchanged => {}
        }
    }

    ctx.mark_dirty(added + changed);
    Ok(EncodeData::integer(added as i64))
}

/// ZSCORE key member
pub(super) fn zscore(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let score = typed_mut(ctx.db, &key_arg(&args[1]), Object::as_zset_mut)?
        .and_then(|zset| zset.score(&Sds::new(&args[2])));
    Ok(score.map_or_else(EncodeData::null, score_reply))
}

/// ZRANK key member (0-based, ascending)
pub(super) fn zrank(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let rank = typed_mut(ctx.db, &key_arg(&args[1]), Object::as_zset_mut)?
        .and_then(|zset| zset.rank(&Sds::new(&args[2])));
    Ok(rank.map_or_else(EncodeData::null, count_reply))
}

/// ZREM key member [member ...]
pub(super) fn zrem(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let key = key_arg(&args[1]);
    let Some(zset) = typed_mut(ctx.db, &key, Object::as_zset_mut)? else {
        return Ok(count_reply(0));
    };

    let removed = args[2..]
        .iter()
        .filter(|member| zset.remove(&Sds::new(member)))
        .count();

    finish_removal(ctx, &key, removed)
}

/// ZCARD key
pub(super) fn zcard(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let len = typed_mut(ctx.db, &key_arg(&args[1]), Object::as_zset_mut)?
        .map_or(0, |zset| zset.len());
    Ok(count_reply(len))
}

/// ZRANGE key start stop [WITHSCORES]
pub(super) fn zrange(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let with_scores = with_scores_flag(&args[4..])?;
    let start = parse_int(&args[2])?;
    let stop = parse_int(&args[3])?;

    let items = typed_mut(ctx.db, &key_arg(&args[1]), Object::as_zset_mut)?
        .map(|zset| zset.range_by_rank(start, stop))
        .unwrap_or_default();
    Ok(members_reply(items, with_scores))
}

/// ZRANGEBYSCORE key min max [WITHSCORES]
pub(super) fn zrangebyscore(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let with_scores = with_scores_flag(&args[4..])?;
    let range = parse_range(&args[2], &args[3])?;

    let items = typed_mut(ctx.db, &key_arg(&args[1]), Object::as_zset_mut)?
        .map(|zset| zset.range_by_score(&range))
        .unwrap_or_default();
    Ok(members_reply(items, with_scores))
}

/// ZCOUNT key min max
pub(super) fn zcount(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let range = parse_range(&args[2], &args[3])?;
    let count = typed_mut(ctx.db, &key_arg(&args[1]), Object::as_zset_mut)?
        .map_or(0, |zset| zset.count(&range));
    Ok(count_reply(count))
}

/// ZINCRBY key increment member
pub(super) fn zincrby(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let delta = parse_float(&args[2])?;
    let member = Sds::new(&args[3]);
    let key = key_arg(&args[1]);
    let zset = typed_or_create(ctx.db, &key, Object::as_zset_mut, Object::new_sorted_set)?;

    // inf + -inf
    let current = zset.score(&member).unwrap_or(0.0);
    if (current + delta).is_nan() {
        return Err(CommandError::NanScore);
    }
    let score = zset.incr_by(member, delta);

    ctx.mark_dirty(1);
    Ok(score_reply(score))
}

/// ZREMRANGEBYSCORE key min max
pub(super) fn zremrangebyscore(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let range = parse_range(&args[2], &args[3])?;
    let key = key_arg(&args[1]);
    let removed = match typed_mut(ctx.db, &key, Object::as_zset_mut)? {
        Some(zset) => zset.remove_range_by_score(&range),
        None => 0,
    };
    finish_removal(ctx, &key, removed)
}

/// ZREMRANGEBYRANK key start stop
pub(super) fn zremrangebyrank(ctx: &mut Context<'_>, args: &[Bytes]) -> CommandResult {
    let start = parse_int(&args[2])?;
    let stop = parse_int(&args[3])?;
    let key = key_arg(&args[1]);
    let removed = match typed_mut(ctx.db, &key, Object::as_zset_mut)? {
        Some(zset) => zset.remove_range_by_rank(start, stop),
        None => 0,
    };
    finish_removal(ctx, &key, removed)
}

// ============================================================================
// Helpers
// ============================================================================

/// Drops the key once its set is empty and replies with `removed`.
fn finish_removal(ctx: &mut Context<'_>, key: &Object, removed: usize) -> CommandResult {
    let emptied =
        typed_mut(ctx.db, key, Object::as_zset_mut)?.is_some_and(|zset| zset.is_empty());
    if emptied {
        ctx.db.remove(key);
    }
    ctx.mark_dirty(removed as u64);
    Ok(count_reply(removed))
}

/// One score bound: `1.5`, `(1.5`, `-inf`, `+inf`.
fn parse_bound(arg: &[u8]) -> Result<(f64, bool), CommandError> {
    let (exclusive, text) = match arg.split_first() {
        Some((b'(', rest)) => (true, rest),
        _ => (false, arg),
    };
    let value = parse_float(text).map_err(|_| CommandError::RangeNotFloat)?;
    Ok((value, exclusive))
}

fn parse_range(min: &[u8], max: &[u8]) -> Result<ZRangeSpec, CommandError> {
    let (min, min_exclusive) = parse_bound(min)?;
    let (max, max_exclusive) = parse_bound(max)?;
    Ok(ZRangeSpec {
        min,
        max,
        min_exclusive,
        max_exclusive,
    })
}

fn with_scores_flag(rest: &[Bytes]) -> Result<bool, CommandError> {
    match rest {
        [] => Ok(false),
        [flag] if flag.eq_ignore_ascii_case(b"withscores") => Ok(true),
        _ => Err(CommandError::Syntax),
    }
}

fn score_reply(score: f64) -> EncodeData {
    EncodeData::bulk(format_score(score).to_bytes())
}

fn members_reply(items: Vec<(Sds, f64)>, with_scores: bool) -> EncodeData {
    let mut out = Vec::with_capacity(items.len() * if with_scores { 2 } else { 1 });
    for (member, score) in items {
        out.push(EncodeData::bulk(member.to_bytes()));
        if with_scores {
            out.push(score_reply(score));
        }
    }
    EncodeData::multi_bulk(out)
}

#[cfg(test)]
mod tests {
    use crate::commands::handler::test_support::*;
    use crate::protocol::EncodeData;

    fn leaderboard() -> (crate::server::Server, crate::server::ClientState) {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "ZADD board 10 alice 20 bob 30 carol 40 dave");
        (server, client)
    }

    #[test]
    fn test_zadd_counts_only_new_members() {
        let (mut server, mut client) = fresh();
        assert_eq!(run(&mut server, &mut client, "ZADD z 1 a 2 b"), EncodeData::integer(2));
        assert_eq!(run(&mut server, &mut client, "ZADD z 5 a 3 c"), EncodeData::integer(1));
        assert_eq!(run(&mut server, &mut client, "ZCARD z"), EncodeData::integer(3));
        assert_eq!(run(&mut server, &mut client, "ZSCORE z a"), EncodeData::bulk("5"));
    }

    #[test]
    fn test_zadd_bad_score_adds_nothing() {
        let (mut server, mut client) = fresh();
        assert_eq!(
            run(&mut server, &mut client, "ZADD z 1 a x b"),
            EncodeData::error("ERR value is not a valid float")
        );
        assert_eq!(run(&mut server, &mut client, "EXISTS z"), EncodeData::integer(0));
        assert_eq!(
            run(&mut server, &mut client, "ZADD z 1 a 2"),
            EncodeData::error("ERR syntax error")
        );
    }

    #[test]
    fn test_zrank_and_zscore() {
        let (mut server, mut client) = leaderboard();
        assert_eq!(run(&mut server, &mut client, "ZRANK board alice"), EncodeData::integer(0));
        assert_eq!(run(&mut server, &mut client, "ZRANK board dave"), EncodeData::integer(3));
        assert_eq!(run(&mut server, &mut client, "ZRANK board nobody"), EncodeData::null());
        assert_eq!(run(&mut server, &mut client, "ZSCORE board bob"), EncodeData::bulk("20"));
        assert_eq!(run(&mut server, &mut client, "ZSCORE nope bob"), EncodeData::null());
    }

    #[test]
    fn test_zrange() {
        let (mut server, mut client) = leaderboard();
        assert_eq!(
            run(&mut server, &mut client, "ZRANGE board 0 -1"),
            bulks(&["alice", "bob", "carol", "dave"])
        );
        assert_eq!(
            run(&mut server, &mut client, "ZRANGE board -2 -1 WITHSCORES"),
            bulks(&["carol", "30", "dave", "40"])
        );
        assert_eq!(run(&mut server, &mut client, "ZRANGE board 10 20"), bulks(&[]));
        assert_eq!(
            run(&mut server, &mut client, "ZRANGE board 0 1 BOGUS"),
            EncodeData::error("ERR syntax error")
        );
    }

    #[test]
    fn test_zrangebyscore_bounds() {
        let (mut server, mut client) = leaderboard();
        assert_eq!(
            run(&mut server, &mut client, "ZRANGEBYSCORE board 20 30"),
            bulks(&["bob", "carol"])
        );
        assert_eq!(
            run(&mut server, &mut client, "ZRANGEBYSCORE board (20 +inf"),
            bulks(&["carol", "dave"])
        );
        assert_eq!(
            run(&mut server, &mut client, "ZRANGEBYSCORE board -inf (20 withscores"),
            bulks(&["alice", "10"])
        );
        assert_eq!(
            run(&mut server, &mut client, "ZRANGEBYSCORE board abc 10"),
            EncodeData::error("ERR min or max is not a float")
        );
    }

    #[test]
    fn test_zcount() {
        let (mut server, mut client) = leaderboard();
        assert_eq!(run(&mut server, &mut client, "ZCOUNT board -inf +inf"), EncodeData::integer(4));
        assert_eq!(run(&mut server, &mut client, "ZCOUNT board (10 (40"), EncodeData::integer(2));
        assert_eq!(run(&mut server, &mut client, "ZCOUNT board 50 60"), EncodeData::integer(0));
    }

    #[test]
    fn test_zincrby() {
        let (mut server, mut client) = leaderboard();
        assert_eq!(
            run(&mut server, &mut client, "ZINCRBY board 25 alice"),
            EncodeData::bulk("35")
        );
        assert_eq!(run(&mut server, &mut client, "ZRANK board alice"), EncodeData::integer(2));
        assert_eq!(
            run(&mut server, &mut client, "ZINCRBY board 1.5 newbie"),
            EncodeData::bulk("1.5")
        );

        run(&mut server, &mut client, "ZADD inf +inf m");
        assert_eq!(
            run(&mut server, &mut client, "ZINCRBY inf -inf m"),
            EncodeData::error("ERR resulting score is not a number (NaN)")
        );
    }

    #[test]
    fn test_zrem_and_empty_removal() {
        let (mut server, mut client) = fresh();
        run(&mut server, &mut client, "ZADD z 1 a 2 b");
        assert_eq!(run(&mut server, &mut client, "ZREM z a x"), EncodeData::integer(1));
        assert_eq!(run(&mut server, &mut client, "ZREM z b"), EncodeData::integer(1));
        assert_eq!(run(&mut server, &mut client, "EXISTS z"), EncodeData::integer(0));
    }

    #[test]
    fn test_zremrangebyscore() {
        let (mut server, mut client) = leaderboard();
        assert_eq!(
            run(&mut server, &mut client, "ZREMRANGEBYSCORE board 15 (40"),
            EncodeData::integer(2)
        );
        assert_eq!(
            run(&mut server, &mut client, "ZRANGE board 0 -1"),
            bulks(&["alice", "dave"])
        );
        assert_eq!(run(&mut server, &mut client, "ZSCORE board bob"), EncodeData::null());
    }

    #[test]
    fn test_zremrangebyrank() {
        let (mut server, mut client) = leaderboard();
        assert_eq!(
            run(&mut server, &mut client, "ZREMRANGEBYRANK board 0 1"),
            EncodeData::integer(2)
        );
        assert_eq!(
            run(&mut server, &mut client, "ZRANGE board 0 -1"),
            bulks(&["carol", "dave"])
        );
        assert_eq!(
            run(&mut server, &mut client, "ZREMRANGEBYRANK board 0 -1"),
            EncodeData::integer(2)
        );
        assert_eq!(run(&mut server, &mut client, "EXISTS board"), EncodeData::integer(0));
    }
}
