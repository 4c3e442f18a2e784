//! Logical Databases
//!
//! A [`Database`] is a keyspace dict plus an expiration dict mapping each
//! volatile key to its absolute deadline in unix milliseconds.
//!
//! Expired keys are removed two ways:
//!
//! - **Lazily**: every lookup checks the key's deadline first.
//! - **Actively**: [`Database::active_expire`] sweeps the expiration dict
//!   with a safe iterator, deleting entries as it goes. The background
//!   sweeper calls it on every database.

use crate::storage::dict::Dict;
use crate::storage::object::{Object, ObjectDict, ObjectDictType};
use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

/// Remaining time to live of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist.
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// Milliseconds left.
    Remaining(u64),
}

#[derive(Debug)]
pub struct Database {
    id: usize,
    dict: ObjectDict,
    expires: ObjectDict,
}

impl Database {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            dict: Dict::new(ObjectDictType),
            expires: Dict::new(ObjectDictType),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of keys, including expired keys not yet collected.
    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }

    /// Number of keys carrying a deadline.
    pub fn volatile_len(&self) -> usize {
        self.expires.len()
    }

    pub fn lookup(&mut self, key: &Object) -> Option<&Object> {
        self.expire_if_needed(key);
        self.dict.get(key)
    }

    pub fn lookup_mut(&mut self, key: &Object) -> Option<&mut Object> {
        self.expire_if_needed(key);
        self.dict.get_mut(key)
    }

    pub fn exists(&mut self, key: &Object) -> bool {
        self.lookup(key).is_some()
    }

    /// Stores `value` under `key`, dropping any previous value and deadline.
    pub fn set(&mut self, key: Object, value: Object) {
        let _ = self.expires.delete(&key);
        self.dict.replace(key, value);
    }

    /// Removes a key and its deadline. Returns `false` if it did not exist.
    pub fn remove(&mut self, key: &Object) -> bool {
        if self.expire_if_needed(key) {
            return false;
        }
        let _ = self.expires.delete(key);
        self.dict.delete(key).is_ok()
    }

    /// Sets an absolute deadline on an existing key.
    pub fn set_expire(&mut self, key: &Object, at_ms: u64) -> bool {
        if !self.exists(key) {
            return false;
        }
        match key.dup_string() {
            Some(owned) => {
                self.expires.replace(owned, Object::Int(at_ms as i64));
                true
            }
            None => false,
        }
    }

    /// Drops the deadline of a key. `false` if the key is missing or was
    /// already persistent.
    pub fn persist(&mut self, key: &Object) -> bool {
        self.exists(key) && self.expires.delete(key).is_ok()
    }

    pub fn ttl_ms(&mut self, key: &Object) -> Ttl {
        if !self.exists(key) {
            return Ttl::Missing;
        }
        match self.deadline(key) {
            Some(at) => Ttl::Remaining(at.saturating_sub(now_ms())),
            None => Ttl::Persistent,
        }
    }

    /// Deletes `key` if its deadline has passed. Returns `true` if it did.
    pub fn expire_if_needed(&mut self, key: &Object) -> bool {
        self.expire_if_needed_at(key, now_ms())
    }

    fn expire_if_needed_at(&mut self, key: &Object, now: u64) -> bool {
        match self.deadline(key) {
            Some(at) if at <= now => {
                let _ = self.expires.delete(key);
                let _ = self.dict.delete(key);
                trace!(db = self.id, "lazily expired key");
                true
            }
            _ => false,
        }
    }

    /// Absolute deadline of `key` in unix milliseconds, if it has one.
    pub fn deadline(&mut self, key: &Object) -> Option<u64> {
        if self.expires.is_empty() {
            return None;
        }
        match self.expires.get(key) {
            Some(Object::Int(at)) => Some(*at as u64),
            _ => None,
        }
    }

    /// Deletes every key whose deadline is at or before `now`.
    ///
    /// # Returns
    ///
    /// The number of keys removed.
    pub fn active_expire(&mut self, now: u64) -> usize {
        let mut it = self.expires.iter_safe();
        let mut expired = 0;

        loop {
            let key = match self.expires.next_entry(&mut it) {
                None => break,
                Some((key, Object::Int(at))) if *at as u64 <= now => key.dup_string(),
                Some(_) => continue,
            };
            if let Some(key) = key {
                let _ = self.expires.delete(&key);
                let _ = self.dict.delete(&key);
                expired += 1;
            }
        }

        // safe iterators never fail to release
        let _ = self.expires.release_iterator(it);
        expired
    }

    /// Runs up to `n` rehash steps on both dicts. Returns `true` if either
    /// still has work left.
    pub fn rehash(&mut self, n: usize) -> bool {
        let keyspace = self.dict.rehash(n);
        let volatile = self.expires.rehash(n);
        keyspace || volatile
    }

    /// Keys matching a glob pattern (`*`, `?`, `[...]`, `\`).
    ///
    /// **Warning**: scans the whole keyspace.
    pub fn keys(&mut self, pattern: &[u8]) -> Vec<Bytes> {
        let glob = GlobPattern::new(pattern);
        let now = now_ms();
        let candidates: Vec<Object> = self
            .dict
            .iter()
            .filter(|(key, _)| key.as_bytes().is_some_and(|bytes| glob.matches(&bytes)))
            .filter_map(|(key, _)| key.dup_string())
            .collect();

        candidates
            .into_iter()
            .filter(|key| self.deadline(key).map_or(true, |at| at > now))
            .filter_map(|key| key.as_bytes().map(|bytes| Bytes::copy_from_slice(&bytes)))
            .collect()
    }

    /// Removes every key. Returns how many there were.
    pub fn flush(&mut self) -> usize {
        let removed = self.dict.len();
        self.dict.clear();
        self.expires.clear();
        removed
    }
}

/// Current unix time in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Byte-oriented glob matcher for `KEYS`.
struct GlobPattern<'a> {
    pattern: &'a [u8],
}

impl<'a> GlobPattern<'a> {
    fn new(pattern: &'a [u8]) -> Self {
        Self { pattern }
    }

    fn matches(&self, text: &[u8]) -> bool {
        match_from(self.pattern, text)
    }
}

/// Iterative glob match. Only the most recent `*` is ever retried, so the
/// cost is bounded by `pattern.len() * text.len()`.
fn match_from(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // pattern index after the last `*`, and the text index it resumes from
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if pattern.get(p) == Some(&b'*') {
            p += 1;
            star = Some((p, t));
            continue;
        }
        if let Some(next) = match_one(pattern, p, text[t]) {
            p = next;
            t += 1;
            continue;
        }
        match star {
            Some((star_p, star_t)) => {
                p = star_p;
                t = star_t + 1;
                star = Some((star_p, t));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}

/// Matches byte `c` against the single token at `pattern[p]`, returning
/// the index of the token after it.
fn match_one(pattern: &[u8], p: usize, c: u8) -> Option<usize> {
    let &token = pattern.get(p)?;
    match token {
        b'?' => Some(p + 1),
        b'[' => match match_class(&pattern[p + 1..], c)? {
            (true, after) => Some(pattern.len() - after.len()),
            (false, _) => None,
        },
        b'\\' if p + 1 < pattern.len() => (pattern[p + 1] == c).then_some(p + 2),
        literal => (literal == c).then_some(p + 1),
    }
}

/// Matches `c` against a class body (the bytes after `[`). Returns whether
/// it matched and the pattern after the closing `]`, or `None` when the
/// class is unterminated.
fn match_class(class: &[u8], c: u8) -> Option<(bool, &[u8])> {
    let (negate, mut i) = match class.first() {
        Some(b'^') => (true, 1),
        _ => (false, 0),
    };
    let mut matched = false;

    while i < class.len() && class[i] != b']' {
        if class[i] == b'\\' && i + 1 < class.len() {
            matched |= class[i + 1] == c;
            i += 2;
            continue;
        }
        if i + 2 < class.len() && class[i + 1] == b'-' && class[i + 2] != b']' {
            let (lo, hi) = (class[i].min(class[i + 2]), class[i].max(class[i + 2]));
            matched |= (lo..=hi).contains(&c);
            i += 3;
            continue;
        }
        matched |= class[i] == c;
        i += 1;
    }

    if i >= class.len() {
        return None;
    }
    Some((matched != negate, &class[i + 1..]))
}
