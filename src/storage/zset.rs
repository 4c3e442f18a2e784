//! Sorted Set Value
//!
//! A sorted set is two indexes over the same members:
//!
//! - a [`ZSkipList`] ordered by `(score, member)` for ranks and ranges
//! - a companion [`Dict`] mapping member → score (stored as its decimal
//!   text) for O(1) score lookups
//!
//! Every mutation goes through this type so the two never disagree.

use crate::storage::dict::Dict;
use crate::storage::sds::{Sds, SdsDictType};
use crate::storage::zskiplist::{ZRangeSpec, ZSkipList};

/// Member → score-text index.
pub type ScoreDict = Dict<Sds, Sds, SdsDictType>;

/// What [`SortedSet::add`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZAddOutcome {
    Added,
    Updated,
    Unchanged,
}

#[derive(Debug)]
pub struct SortedSet {
    list: ZSkipList,
    dict: ScoreDict,
}

impl Default for SortedSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SortedSet {
    pub fn new() -> Self {
        Self {
            list: ZSkipList::new(),
            dict: Dict::new(SdsDictType),
        }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Current score of `member`.
    pub fn score(&mut self, member: &Sds) -> Option<f64> {
        self.dict.get(member).and_then(parse_stored_score)
    }

    /// Inserts `member` or moves it to `score`.
    pub fn add(&mut self, member: Sds, score: f64) -> ZAddOutcome {
        match self.score(&member) {
            None => {
                self.dict.replace(member.clone(), format_score(score));
                self.list.insert(score, member);
                ZAddOutcome::Added
            }
            Some(current) if current == score => ZAddOutcome::Unchanged,
            Some(current) => {
                self.list.update(&member, current, score);
                self.dict.replace(member, format_score(score));
                ZAddOutcome::Updated
            }
        }
    }

    /// Adds `delta` to the member's score (missing members start at 0).
    /// Returns the new score.
    pub fn incr_by(&mut self, member: Sds, delta: f64) -> f64 {
        let score = self.score(&member).unwrap_or(0.0) + delta;
        self.add(member, score);
        score
    }

    pub fn remove(&mut self, member: &Sds) -> bool {
        match self.dict.delete(member) {
            Ok((_, stored)) => {
                if let Some(score) = parse_stored_score(&stored) {
                    self.list.delete(score, member);
                }
                true
            }
            Err(_) => false,
        }
    }

    /// 0-based rank in ascending order.
    pub fn rank(&mut self, member: &Sds) -> Option<usize> {
        let score = self.score(member)?;
        self.list.get_rank(score, member)
    }

    /// Members with ranks `start..=stop`. Negative indexes count from the end.
    pub fn range_by_rank(&self, start: i64, stop: i64) -> Vec<(Sds, f64)> {
        let Some((start, stop)) = clamp_rank_range(start, stop, self.len()) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(stop - start + 1);
        let mut cursor = self.list.get_element_by_rank(start);
        while let Some(id) = cursor {
            if out.len() > stop - start {
                break;
            }
            let Some(node) = self.list.node(id) else { break };
            out.push((node.member().clone(), node.score()));
            cursor = self.list.next(id);
        }
        out
    }

    /// Members whose score lies in `range`, ascending.
    pub fn range_by_score(&self, range: &ZRangeSpec) -> Vec<(Sds, f64)> {
        let mut out = Vec::new();
        let mut cursor = self.list.first_in_range(range);
        while let Some(id) = cursor {
            let Some(node) = self.list.node(id) else { break };
            if !range.value_lte_max(node.score()) {
                break;
            }
            out.push((node.member().clone(), node.score()));
            cursor = self.list.next(id);
        }
        out
    }

    /// Number of members whose score lies in `range`.
    pub fn count(&self, range: &ZRangeSpec) -> usize {
        let (Some(first), Some(last)) = (
            self.list.first_in_range(range),
            self.list.last_in_range(range),
        ) else {
            return 0;
        };
        let rank_of = |id| {
            self.list
                .node(id)
                .and_then(|node| self.list.get_rank(node.score(), node.member()))
        };
        match (rank_of(first), rank_of(last)) {
            (Some(lo), Some(hi)) if hi >= lo => hi - lo + 1,
            _ => 0,
        }
    }

    pub fn remove_range_by_score(&mut self, range: &ZRangeSpec) -> usize {
        self.list.delete_range_by_score(range, &mut self.dict)
    }

    /// Removes ranks `start..=stop` (negative indexes count from the end).
    pub fn remove_range_by_rank(&mut self, start: i64, stop: i64) -> usize {
        match clamp_rank_range(start, stop, self.len()) {
            Some((start, stop)) => self.list.delete_range_by_rank(start, stop, &mut self.dict),
            None => 0,
        }
    }

    /// Ascending `(member, score)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Sds, f64)> {
        self.list.iter()
    }
}

/// Renders a score the way it is stored and replied: shortest text that
/// parses back to the same `f64`.
pub fn format_score(score: f64) -> Sds {
    if score == f64::INFINITY {
        Sds::from("inf")
    } else if score == f64::NEG_INFINITY {
        Sds::from("-inf")
    } else {
        Sds::from(score.to_string().as_str())
    }
}

fn parse_stored_score(stored: &Sds) -> Option<f64> {
    std::str::from_utf8(stored.as_bytes()).ok()?.parse().ok()
}

/// Resolves Redis-style inclusive rank bounds against `len`.
fn clamp_rank_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sds(s: &str) -> Sds {
        Sds::from(s)
    }

    fn sample() -> SortedSet {
        let mut zset = SortedSet::new();
        for (member, score) in [("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)] {
            zset.add(sds(member), score);
        }
        zset
    }

    fn members(items: Vec<(Sds, f64)>) -> Vec<String> {
        items.into_iter().map(|(m, _)| m.to_string()).collect()
    }

    #[test]
    fn test_add_update_unchanged() {
        let mut zset = SortedSet::new();
        assert_eq!(zset.add(sds("a"), 1.0), ZAddOutcome::Added);
        assert_eq!(zset.add(sds("a"), 1.0), ZAddOutcome::Unchanged);
        assert_eq!(zset.add(sds("a"), 5.0), ZAddOutcome::Updated);
        assert_eq!(zset.score(&sds("a")), Some(5.0));
        assert_eq!(zset.len(), 1);
    }

    #[test]
    fn test_remove_keeps_indexes_in_step() {
        let mut zset = sample();
        assert!(zset.remove(&sds("b")));
        assert!(!zset.remove(&sds("b")));
        assert_eq!(zset.score(&sds("b")), None);
        assert_eq!(zset.rank(&sds("c")), Some(1));
        assert_eq!(zset.len(), 3);
    }

    #[test]
    fn test_incr_by() {
        let mut zset = sample();
        assert_eq!(zset.incr_by(sds("a"), 10.0), 11.0);
        assert_eq!(zset.rank(&sds("a")), Some(3));
        assert_eq!(zset.incr_by(sds("new"), -2.5), -2.5);
        assert_eq!(zset.rank(&sds("new")), Some(0));
    }

    #[test]
    fn test_range_by_rank_negative_indexes() {
        let zset = sample();
        assert_eq!(members(zset.range_by_rank(0, -1)), vec!["a", "b", "c", "d"]);
        assert_eq!(members(zset.range_by_rank(-2, -1)), vec!["c", "d"]);
        assert_eq!(members(zset.range_by_rank(1, 100)), vec!["b", "c", "d"]);
        assert!(zset.range_by_rank(3, 1).is_empty());
        assert!(zset.range_by_rank(10, 20).is_empty());
        assert!(SortedSet::new().range_by_rank(0, -1).is_empty());
    }

    #[test]
    fn test_range_by_score_and_count() {
        let zset = sample();
        let range = ZRangeSpec {
            min_exclusive: true,
            ..ZRangeSpec::inclusive(1.0, 3.0)
        };
        assert_eq!(members(zset.range_by_score(&range)), vec!["b", "c"]);
        assert_eq!(zset.count(&range), 2);
        assert_eq!(
            zset.count(&ZRangeSpec::inclusive(f64::NEG_INFINITY, f64::INFINITY)),
            4
        );
        assert_eq!(zset.count(&ZRangeSpec::inclusive(1.5, 1.7)), 0);
    }

    #[test]
    fn test_remove_ranges() {
        let mut zset = sample();
        assert_eq!(zset.remove_range_by_score(&ZRangeSpec::inclusive(2.0, 3.0)), 2);
        assert_eq!(zset.score(&sds("b")), None);
        assert_eq!(zset.len(), 2);

        assert_eq!(zset.remove_range_by_rank(0, -1), 2);
        assert!(zset.is_empty());
        assert_eq!(zset.score(&sds("d")), None);
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(1.0).to_string(), "1");
        assert_eq!(format_score(2.5).to_string(), "2.5");
        assert_eq!(format_score(f64::INFINITY).to_string(), "inf");
        assert_eq!(format_score(f64::NEG_INFINITY).to_string(), "-inf");
        assert_eq!(parse_stored_score(&format_score(0.1)), Some(0.1));
    }
}
