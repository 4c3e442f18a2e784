//! Rank-Aware Skip List
//!
//! The ordered half of a sorted set. Nodes are kept in ascending
//! `(score, member)` order and every forward link carries a *span*: the
//! number of level-0 steps it jumps over. Summing spans along a search path
//! yields a node's rank, so rank queries cost the same O(log n) as lookups.
//!
//! ```text
//! level 2:  H ─────────(3)─────────> C ──(2)──> None
//! level 1:  H ──(1)──> A ───(2)────> C ──(2)──> None
//! level 0:  H ──(1)──> A ──(1)──> B ──(1)──> C ──(1)──> D ──(1)──> E ──(0)──> None
//! ```
//!
//! A link with no forward node spans the nodes still remaining after it.
//!
//! ## Storage
//!
//! Nodes live in a generational arena and are named by [`NodeId`]. The
//! header is a separate 32-level sentinel; inside the list code a position
//! is an `Option<NodeId>` where `None` is the header. `backward` links are
//! plain ids and never own anything. Freeing a node bumps its slot's
//! generation, so an id never names two different nodes.

use crate::storage::dict::{Dict, DictType};
use crate::storage::sds::Sds;
use rand::Rng;
use tracing::warn;

/// Number of levels of the header, and the tallest a node can be.
pub const ZSKIPLIST_MAXLEVEL: usize = 32;

/// Stable identity of a node in one [`ZSkipList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct ZLevel {
    forward: Option<NodeId>,
    span: usize,
}

/// A member/score pair stored in the list.
#[derive(Debug)]
pub struct ZSkipListNode {
    member: Sds,
    score: f64,
    backward: Option<NodeId>,
    levels: Vec<ZLevel>,
}

impl ZSkipListNode {
    pub fn member(&self) -> &Sds {
        &self.member
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Number of levels this node participates in.
    pub fn height(&self) -> usize {
        self.levels.len()
    }

    /// Does this node sort strictly before `(score, member)`?
    #[inline]
    fn precedes(&self, score: f64, member: &Sds) -> bool {
        self.score < score || (self.score == score && self.member < *member)
    }
}

/// A score interval with optionally exclusive ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZRangeSpec {
    pub min: f64,
    pub max: f64,
    pub min_exclusive: bool,
    pub max_exclusive: bool,
}

impl ZRangeSpec {
    /// `[min, max]`
    pub fn inclusive(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            min_exclusive: false,
            max_exclusive: false,
        }
    }

    /// True when no score can satisfy the bound.
    pub fn is_empty(&self) -> bool {
        self.min > self.max || (self.min == self.max && (self.min_exclusive || self.max_exclusive))
    }

    #[inline]
    pub fn value_gte_min(&self, value: f64) -> bool {
        if self.min_exclusive {
            value > self.min
        } else {
            value >= self.min
        }
    }

    #[inline]
    pub fn value_lte_max(&self, value: f64) -> bool {
        if self.max_exclusive {
            value < self.max
        } else {
            value <= self.max
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.value_gte_min(value) && self.value_lte_max(value)
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<ZSkipListNode>,
}

type Borders = [Option<NodeId>; ZSKIPLIST_MAXLEVEL];

/// Ordered skip list keyed by `(score, member)`.
#[derive(Debug)]
pub struct ZSkipList {
    header: [ZLevel; ZSKIPLIST_MAXLEVEL],
    tail: Option<NodeId>,
    length: usize,
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl Default for ZSkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl ZSkipList {
    pub fn new() -> Self {
        Self {
            header: [ZLevel::default(); ZSKIPLIST_MAXLEVEL],
            tail: None,
            length: 0,
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Node with the lowest `(score, member)`.
    pub fn first(&self) -> Option<NodeId> {
        self.header[0].forward
    }

    /// Node with the highest `(score, member)`.
    pub fn last(&self) -> Option<NodeId> {
        self.tail
    }

    /// Resolves an id. Returns `None` for ids of deleted nodes.
    pub fn node(&self, id: NodeId) -> Option<&ZSkipListNode> {
        match self.slots.get(id.index) {
            Some(slot) if slot.generation == id.generation => slot.node.as_ref(),
            _ => None,
        }
    }

    /// Level-0 successor.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.levels[0].forward
    }

    /// Level-0 predecessor (`None` for the first node).
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.backward
    }

    /// Ascending iterator over `(member, score)`.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.first(),
        }
    }

    /// Inserts a new node. The caller guarantees `(score, member)` is not
    /// already present.
    pub fn insert(&mut self, score: f64, member: Sds) -> NodeId {
        let mut borders: Borders = [None; ZSKIPLIST_MAXLEVEL];
        // dis[i]: level-0 distance from the header to borders[i]
        let mut dis = [0usize; ZSKIPLIST_MAXLEVEL];

        let mut p: Option<NodeId> = None;
        for i in (0..ZSKIPLIST_MAXLEVEL).rev() {
            dis[i] = if i == ZSKIPLIST_MAXLEVEL - 1 { 0 } else { dis[i + 1] };
            while let Some(next) = self.level(p, i).forward {
                if !self.node_ref(next).precedes(score, &member) {
                    break;
                }
                dis[i] += self.level(p, i).span;
                p = Some(next);
            }
            borders[i] = p;
        }

        let height = random_level();
        let id = self.alloc(ZSkipListNode {
            member,
            score,
            backward: borders[0],
            levels: vec![ZLevel::default(); height],
        });

        for i in 0..height {
            let border = *self.level(borders[i], i);
            let walked = dis[0] - dis[i];

            let node_level = &mut self.node_mut(id).levels[i];
            node_level.forward = border.forward;
            node_level.span = border.span - walked;

            let border_level = self.level_mut(borders[i], i);
            border_level.forward = Some(id);
            border_level.span = walked + 1;
        }

        // taller borders jump over the new node
        for (i, border) in borders.iter().enumerate().skip(height) {
            self.level_mut(*border, i).span += 1;
        }

        match self.node_ref(id).levels[0].forward {
            Some(next) => self.node_mut(next).backward = Some(id),
            None => self.tail = Some(id),
        }
        self.length += 1;
        id
    }

    /// Removes the node matching `(score, member)` exactly.
    pub fn delete(&mut self, score: f64, member: &Sds) -> bool {
        let borders = self.find_borders(score, member);
        match self.level(borders[0], 0).forward {
            Some(id) if self.matches(id, score, member) => {
                self.delete_node(id, &borders);
                true
            }
            _ => false,
        }
    }

    /// Moves `member` from `cur_score` to `new_score`.
    ///
    /// If the node keeps its position the score is rewritten in place and
    /// the same id is returned; otherwise the node is reinserted and a new
    /// id is returned. `None` if `(cur_score, member)` is not in the list.
    pub fn update(&mut self, member: &Sds, cur_score: f64, new_score: f64) -> Option<NodeId> {
        let borders = self.find_borders(cur_score, member);
        let id = self.level(borders[0], 0).forward?;
        if !self.matches(id, cur_score, member) {
            return None;
        }

        let node = self.node_ref(id);
        let before_next = node.levels[0]
            .forward
            .map_or(true, |next| self.node_ref(next).score > new_score);
        let after_prev = node
            .backward
            .map_or(true, |prev| self.node_ref(prev).score < new_score);
        if before_next && after_prev {
            self.node_mut(id).score = new_score;
            return Some(id);
        }

        let removed = self.delete_node(id, &borders);
        Some(self.insert(new_score, removed.member))
    }

    /// Does any node fall inside `range`?
    pub fn is_in_range(&self, range: &ZRangeSpec) -> bool {
        if range.is_empty() {
            return false;
        }
        match (self.tail, self.first()) {
            (Some(last), Some(first)) => {
                range.value_gte_min(self.node_ref(last).score)
                    && range.value_lte_max(self.node_ref(first).score)
            }
            _ => false,
        }
    }

    /// Lowest node inside `range`.
    pub fn first_in_range(&self, range: &ZRangeSpec) -> Option<NodeId> {
        if !self.is_in_range(range) {
            return None;
        }
        let mut p: Option<NodeId> = None;
        for i in (0..ZSKIPLIST_MAXLEVEL).rev() {
            while let Some(next) = self.level(p, i).forward {
                if range.value_gte_min(self.node_ref(next).score) {
                    break;
                }
                p = Some(next);
            }
        }
        let id = self.level(p, 0).forward?;
        range.value_lte_max(self.node_ref(id).score).then_some(id)
    }

    /// Highest node inside `range`.
    pub fn last_in_range(&self, range: &ZRangeSpec) -> Option<NodeId> {
        if !self.is_in_range(range) {
            return None;
        }
        let mut p: Option<NodeId> = None;
        for i in (0..ZSKIPLIST_MAXLEVEL).rev() {
            while let Some(next) = self.level(p, i).forward {
                if !range.value_lte_max(self.node_ref(next).score) {
                    break;
                }
                p = Some(next);
            }
        }
        let id = p?;
        range.value_gte_min(self.node_ref(id).score).then_some(id)
    }

    /// Removes every node whose score is inside `range`, dropping each
    /// member from the companion `dict` as well. Returns the number removed.
    pub fn delete_range_by_score<V, T>(
        &mut self,
        range: &ZRangeSpec,
        dict: &mut Dict<Sds, V, T>,
    ) -> usize
    where
        T: DictType<Sds>,
    {
        let mut borders: Borders = [None; ZSKIPLIST_MAXLEVEL];
        let mut p: Option<NodeId> = None;
        for i in (0..ZSKIPLIST_MAXLEVEL).rev() {
            while let Some(next) = self.level(p, i).forward {
                if range.value_gte_min(self.node_ref(next).score) {
                    break;
                }
                p = Some(next);
            }
            borders[i] = p;
        }

        let mut removed = 0;
        let mut cursor = self.level(p, 0).forward;
        while let Some(id) = cursor {
            if !range.value_lte_max(self.node_ref(id).score) {
                break;
            }
            cursor = self.node_ref(id).levels[0].forward;
            let node = self.delete_node(id, &borders);
            forget_member(dict, &node.member);
            removed += 1;
        }
        removed
    }

    /// Removes nodes with 0-based ranks in `start..=end`, dropping each
    /// member from the companion `dict` as well. Returns the number removed.
    pub fn delete_range_by_rank<V, T>(
        &mut self,
        start: usize,
        end: usize,
        dict: &mut Dict<Sds, V, T>,
    ) -> usize
    where
        T: DictType<Sds>,
    {
        let mut borders: Borders = [None; ZSKIPLIST_MAXLEVEL];
        let mut traversed = 0;
        let mut p: Option<NodeId> = None;
        for i in (0..ZSKIPLIST_MAXLEVEL).rev() {
            while let Some(next) = self.level(p, i).forward {
                let span = self.level(p, i).span;
                if traversed + span > start {
                    break;
                }
                traversed += span;
                p = Some(next);
            }
            borders[i] = p;
        }

        // `traversed` now counts 1-based positions
        traversed += 1;
        let mut removed = 0;
        let mut cursor = self.level(p, 0).forward;
        while let Some(id) = cursor {
            if traversed > end + 1 {
                break;
            }
            cursor = self.node_ref(id).levels[0].forward;
            let node = self.delete_node(id, &borders);
            forget_member(dict, &node.member);
            removed += 1;
            traversed += 1;
        }
        removed
    }

    /// 0-based rank of `(score, member)`, or `None` if it is not present.
    pub fn get_rank(&self, score: f64, member: &Sds) -> Option<usize> {
        let mut traversed = 0;
        let mut p: Option<NodeId> = None;
        for i in (0..ZSKIPLIST_MAXLEVEL).rev() {
            while let Some(next) = self.level(p, i).forward {
                let node = self.node_ref(next);
                let at_or_before =
                    node.precedes(score, member) || (node.score == score && node.member == *member);
                if !at_or_before {
                    break;
                }
                traversed += self.level(p, i).span;
                p = Some(next);
            }
            if let Some(id) = p {
                if self.matches(id, score, member) {
                    return Some(traversed - 1);
                }
            }
        }
        None
    }

    /// Node at 0-based `rank`.
    pub fn get_element_by_rank(&self, rank: usize) -> Option<NodeId> {
        let target = rank + 1;
        let mut traversed = 0;
        let mut p: Option<NodeId> = None;
        for i in (0..ZSKIPLIST_MAXLEVEL).rev() {
            while let Some(next) = self.level(p, i).forward {
                let span = self.level(p, i).span;
                if traversed + span > target {
                    break;
                }
                traversed += span;
                p = Some(next);
            }
            if traversed == target {
                return p;
            }
        }
        None
    }

    /// Unlinks `id` given the per-level predecessors found by a search,
    /// and frees its slot.
    fn delete_node(&mut self, id: NodeId, borders: &Borders) -> ZSkipListNode {
        for (i, border) in borders.iter().enumerate() {
            let node_level = self.node_ref(id).levels.get(i).copied();
            let border_level = self.level_mut(*border, i);
            match node_level {
                Some(level) if border_level.forward == Some(id) => {
                    border_level.forward = level.forward;
                    border_level.span = border_level.span + level.span - 1;
                }
                _ => border_level.span -= 1,
            }
        }

        let node = self.node_ref(id);
        let (forward, backward) = (node.levels[0].forward, node.backward);
        match forward {
            Some(next) => self.node_mut(next).backward = backward,
            None => self.tail = backward,
        }
        self.length -= 1;
        self.release(id)
    }

    /// Per-level predecessors of `(score, member)`.
    fn find_borders(&self, score: f64, member: &Sds) -> Borders {
        let mut borders: Borders = [None; ZSKIPLIST_MAXLEVEL];
        let mut p: Option<NodeId> = None;
        for i in (0..ZSKIPLIST_MAXLEVEL).rev() {
            while let Some(next) = self.level(p, i).forward {
                if !self.node_ref(next).precedes(score, member) {
                    break;
                }
                p = Some(next);
            }
            borders[i] = p;
        }
        borders
    }

    #[inline]
    fn matches(&self, id: NodeId, score: f64, member: &Sds) -> bool {
        let node = self.node_ref(id);
        node.score == score && node.member == *member
    }

    #[inline]
    fn level(&self, pos: Option<NodeId>, i: usize) -> &ZLevel {
        match pos {
            None => &self.header[i],
            Some(id) => &self.node_ref(id).levels[i],
        }
    }

    #[inline]
    fn level_mut(&mut self, pos: Option<NodeId>, i: usize) -> &mut ZLevel {
        match pos {
            None => &mut self.header[i],
            Some(id) => &mut self.node_mut(id).levels[i],
        }
    }

    fn node_ref(&self, id: NodeId) -> &ZSkipListNode {
        match self.node(id) {
            Some(node) => node,
            None => unreachable!("skip list link to freed node {id:?}"),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut ZSkipListNode {
        match self.slots.get_mut(id.index) {
            Some(Slot {
                generation,
                node: Some(node),
            }) if *generation == id.generation => node,
            _ => unreachable!("skip list link to freed node {id:?}"),
        }
    }

    fn alloc(&mut self, node: ZSkipListNode) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    fn release(&mut self, id: NodeId) -> ZSkipListNode {
        let slot = &mut self.slots[id.index];
        slot.generation = slot.generation.wrapping_add(1);
        match slot.node.take() {
            Some(node) => {
                self.free.push(id.index);
                node
            }
            None => unreachable!("skip list node {id:?} freed twice"),
        }
    }
}

/// Ascending iterator returned by [`ZSkipList::iter`].
pub struct Iter<'a> {
    list: &'a ZSkipList,
    cursor: Option<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Sds, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.node(self.cursor?)?;
        self.cursor = node.levels[0].forward;
        Some((&node.member, node.score))
    }
}

/// Draws a node height uniformly from `1..=ZSKIPLIST_MAXLEVEL`.
fn random_level() -> usize {
    rand::thread_rng().gen_range(1..=ZSKIPLIST_MAXLEVEL)
}

/// Drops a range-deleted member from the companion dict. A member missing
/// there means the two structures have drifted apart.
fn forget_member<V, T: DictType<Sds>>(dict: &mut Dict<Sds, V, T>, member: &Sds) {
    if let Err(e) = dict.delete(member) {
        warn!(member = %member, error = %e, "sorted set member missing from its dict");
        debug_assert!(false, "companion dict lost member {member}: {e}");
    }
}
