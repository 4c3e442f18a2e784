//! Incrementally Rehashing Hash Table
//!
//! `Dict` is the hash table behind every keyspace, hash, set and sorted-set
//! member index. It never resizes in one blocking pass: when the table
//! grows, a second generation is allocated and entries migrate a bucket at
//! a time, piggy-backed on normal `add`/`search`/`delete` traffic.
//!
//! ## Layout
//!
//! ```text
//!  Dict
//!  ├── ht[0]  buckets: [Some(3)] [None] [Some(0)] [None]     (old generation)
//!  ├── ht[1]  buckets: [..8 buckets..]                        (new generation, only while rehashing)
//!  ├── slots: arena of entries, chained through `next` indices
//!  ├── rehash_index: Some(n) while migrating, else None
//!  └── iterators: number of live safe iterators (pauses rehashing)
//! ```
//!
//! Entries live in a slot arena owned by the dict. Bucket heads and chain
//! links are plain indices into that arena, so migrating an entry between
//! generations only rewrites two indices; the entry itself never moves.
//!
//! ## Growth
//!
//! The first insert allocates a 4-bucket table. After that the table
//! doubles whenever `used / size` reaches [`DICT_FORCE_RESIZE_RATIO`].
//! The table never shrinks.
//!
//! ## Iteration
//!
//! [`Dict::iter`] borrows the dict and is the normal way to read it.
//! For traversals that need to mutate the dict as they go, a detached
//! [`DictIterator`] cursor is advanced with [`Dict::next_entry`]:
//!
//! - a *safe* cursor pauses rehashing while it is live, so inserts and
//!   deleting the entry just returned are allowed;
//! - an *unsafe* cursor records a fingerprint of the table shape and
//!   reports [`DictError::FingerprintMismatch`] on release if the dict was
//!   modified underneath it.
//!
//! Cursors must be handed back with [`Dict::release_iterator`].

use std::cmp::Ordering;
use std::fmt;
use std::mem;
use thiserror::Error;
use tracing::error;

/// Bucket count of a freshly initialised table.
pub const DICT_HT_INITIAL_SIZE: usize = 4;

/// The table doubles once it holds this many entries per bucket.
pub const DICT_FORCE_RESIZE_RATIO: usize = 5;

/// Buckets migrated by the step piggy-backed on each operation.
const DICT_REHASH_STEP: usize = 1;

/// Hash and comparison strategy for dict keys.
///
/// Two keys that compare `Equal` must hash to the same value.
pub trait DictType<K> {
    fn hash(&self, key: &K) -> u64;
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Errors reported by dict operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DictError {
    /// `add` found an equal key already present.
    #[error("key already exists")]
    KeyExists,

    /// `delete` found no matching key.
    #[error("key not found")]
    KeyNotFound,

    /// The dict changed while an unsafe iterator was walking it.
    #[error("dict modified during unsafe iteration (fingerprint {expected:#x} != {actual:#x})")]
    FingerprintMismatch { expected: u64, actual: u64 },
}

/// Size and fill of one table generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub size: usize,
    pub used: usize,
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    next: Option<usize>,
}

/// One table generation.
#[derive(Debug, Default)]
struct HashTable {
    buckets: Vec<Option<usize>>,
    size_mask: usize,
    used: usize,
    /// Identity of this allocation, used by the fingerprint.
    token: u64,
}

impl HashTable {
    fn with_size(size: usize, token: u64) -> Self {
        Self {
            buckets: vec![None; size],
            size_mask: size - 1,
            used: 0,
            token,
        }
    }

    #[inline]
    fn size(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & self.size_mask
    }
}

/// A detached iteration cursor over a [`Dict`].
///
/// Created by [`Dict::iter_safe`] or [`Dict::iter_unsafe`], advanced with
/// [`Dict::next_entry`] and handed back with [`Dict::release_iterator`].
#[derive(Debug)]
#[must_use = "dict iterators must be released with Dict::release_iterator"]
pub struct DictIterator {
    safe: bool,
    started: bool,
    table: usize,
    /// Next bucket to visit in `table`.
    index: usize,
    /// Saved successor of the entry last returned.
    next: Option<usize>,
    fingerprint: u64,
}

impl DictIterator {
    fn new(safe: bool) -> Self {
        Self {
            safe,
            started: false,
            table: 0,
            index: 0,
            next: None,
            fingerprint: 0,
        }
    }

    pub fn is_safe(&self) -> bool {
        self.safe
    }
}

/// An incrementally rehashing hash table.
pub struct Dict<K, V, T> {
    ht: [HashTable; 2],
    slots: Vec<Option<Entry<K, V>>>,
    free: Vec<usize>,
    dict_type: T,
    rehash_index: Option<usize>,
    iterators: usize,
    next_token: u64,
}

impl<K, V, T> fmt::Debug for Dict<K, V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dict")
            .field("len", &(self.ht[0].used + self.ht[1].used))
            .field("ht0_size", &self.ht[0].size())
            .field("ht1_size", &self.ht[1].size())
            .field("rehash_index", &self.rehash_index)
            .field("iterators", &self.iterators)
            .finish()
    }
}

impl<K, V, T: DictType<K>> Dict<K, V, T> {
    /// Creates an empty dict. No buckets are allocated until the first insert.
    pub fn new(dict_type: T) -> Self {
        Self {
            ht: [HashTable::default(), HashTable::default()],
            slots: Vec::new(),
            free: Vec::new(),
            dict_type,
            rehash_index: None,
            iterators: 0,
            next_token: 1,
        }
    }

    /// Number of entries across both generations.
    #[inline]
    pub fn len(&self) -> usize {
        self.ht[0].used + self.ht[1].used
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_rehashing(&self) -> bool {
        self.rehash_index.is_some()
    }

    /// Next bucket of `ht[0]` to migrate, if a rehash is in progress.
    pub fn rehash_index(&self) -> Option<usize> {
        self.rehash_index
    }

    /// Number of live safe iterators.
    pub fn safe_iterators(&self) -> usize {
        self.iterators
    }

    /// Size and fill of `ht[0]` and `ht[1]`.
    pub fn stats(&self) -> [TableStats; 2] {
        [0, 1].map(|i| TableStats {
            size: self.ht[i].size(),
            used: self.ht[i].used,
        })
    }

    /// Inserts `key` if no equal key exists in either generation.
    pub fn add(&mut self, key: K, value: V) -> Result<(), DictError> {
        self.rehash_step();
        self.expand_if_full();

        let hash = self.dict_type.hash(&key);
        let bucket = self.free_bucket(hash, &key)?;
        let table = if self.is_rehashing() { 1 } else { 0 };

        let head = self.ht[table].buckets[bucket];
        let idx = self.alloc(Entry {
            key,
            value,
            next: head,
        });
        self.ht[table].buckets[bucket] = Some(idx);
        self.ht[table].used += 1;
        Ok(())
    }

    /// Inserts or overwrites. Returns `true` when a new entry was created.
    pub fn replace(&mut self, key: K, value: V) -> bool {
        if let Some(idx) = self.find(&key) {
            self.entry_mut(idx).value = value;
            return false;
        }
        self.add(key, value).is_ok()
    }

    /// Looks up the entry for `key`.
    pub fn search(&mut self, key: &K) -> Option<(&K, &V)> {
        let idx = self.find(key)?;
        let entry = self.entry(idx);
        Some((&entry.key, &entry.value))
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.search(key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = self.find(key)?;
        Some(&mut self.entry_mut(idx).value)
    }

    pub fn contains_key(&mut self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Unlinks the entry for `key` and returns it.
    pub fn delete(&mut self, key: &K) -> Result<(K, V), DictError> {
        if self.is_empty() {
            return Err(DictError::KeyNotFound);
        }
        self.rehash_step();

        let hash = self.dict_type.hash(key);
        for table in 0..2 {
            if self.ht[table].size() == 0 {
                break;
            }
            let bucket = self.ht[table].bucket_of(hash);
            let mut prev: Option<usize> = None;
            let mut cursor = self.ht[table].buckets[bucket];

            while let Some(idx) = cursor {
                let entry = self.entry(idx);
                let next = entry.next;
                if self.keys_match(&entry.key, key) {
                    match prev {
                        Some(p) => self.entry_mut(p).next = next,
                        None => self.ht[table].buckets[bucket] = next,
                    }
                    self.ht[table].used -= 1;
                    let entry = self.release(idx);
                    return Ok((entry.key, entry.value));
                }
                prev = Some(idx);
                cursor = next;
            }

            if !self.is_rehashing() {
                break;
            }
        }
        Err(DictError::KeyNotFound)
    }

    /// Drops every entry and both tables.
    pub fn clear(&mut self) {
        self.ht = [HashTable::default(), HashTable::default()];
        self.slots.clear();
        self.free.clear();
        self.rehash_index = None;
    }

    /// Grows the table if it is uninitialised or over the load factor.
    ///
    /// Returns `true` if a new table was allocated.
    pub fn expand_if_full(&mut self) -> bool {
        if self.is_rehashing() {
            return false;
        }
        let size = self.ht[0].size();
        if size == 0 {
            return self.expand(DICT_HT_INITIAL_SIZE);
        }
        if self.ht[0].used >= size * DICT_FORCE_RESIZE_RATIO {
            return self.expand(size << 1);
        }
        false
    }

    /// Allocates a table of at least `size` buckets.
    ///
    /// An uninitialised dict gets the table as `ht[0]` directly; otherwise
    /// it becomes `ht[1]` and a rehash begins. Returns `false` if a rehash
    /// is already running or the table would not grow.
    pub fn expand(&mut self, size: usize) -> bool {
        if self.is_rehashing() {
            return false;
        }
        let size = next_power(size);
        if size <= self.ht[0].size() {
            return false;
        }

        let token = self.next_token;
        self.next_token += 1;
        let table = HashTable::with_size(size, token);

        if self.ht[0].size() == 0 {
            self.ht[0] = table;
        } else {
            self.ht[1] = table;
            self.rehash_index = Some(0);
        }
        true
    }

    /// Migrates up to `n` non-empty buckets from `ht[0]` to `ht[1]`.
    ///
    /// Does nothing while a safe iterator is live. Returns `true` if the
    /// rehash still has buckets left to move.
    pub fn rehash(&mut self, n: usize) -> bool {
        let Some(mut index) = self.rehash_index else {
            return false;
        };
        if self.iterators > 0 {
            return true;
        }

        let mut remaining = n;
        while remaining > 0 && self.ht[0].used > 0 {
            // used > 0 guarantees a non-empty bucket at or after `index`
            while self.ht[0].buckets[index].is_none() {
                index += 1;
            }

            let mut cursor = self.ht[0].buckets[index].take();
            while let Some(idx) = cursor {
                let hash = self.dict_type.hash(&self.entry(idx).key);
                let dest = self.ht[1].bucket_of(hash);
                let head = self.ht[1].buckets[dest];

                let entry = self.entry_mut(idx);
                cursor = entry.next;
                entry.next = head;

                self.ht[1].buckets[dest] = Some(idx);
                self.ht[0].used -= 1;
                self.ht[1].used += 1;
            }

            index += 1;
            remaining -= 1;
        }

        if self.ht[0].used == 0 {
            self.ht[0] = mem::take(&mut self.ht[1]);
            self.rehash_index = None;
            return false;
        }

        self.rehash_index = Some(index);
        true
    }

    /// Starts a safe iteration. Rehashing pauses from the first advance
    /// until the cursor is released.
    pub fn iter_safe(&self) -> DictIterator {
        DictIterator::new(true)
    }

    /// Starts an unsafe iteration. The dict must not be modified until the
    /// cursor is released.
    pub fn iter_unsafe(&self) -> DictIterator {
        DictIterator::new(false)
    }

    /// Advances a detached cursor.
    pub fn next_entry(&mut self, it: &mut DictIterator) -> Option<(&K, &V)> {
        if !it.started {
            it.started = true;
            if it.safe {
                self.iterators += 1;
            } else {
                it.fingerprint = self.fingerprint();
            }
        }

        let mut cursor = it.next.take();
        while cursor.is_none() {
            if it.index >= self.ht[it.table].size() {
                if it.table == 0 && self.is_rehashing() {
                    it.table = 1;
                    it.index = 0;
                    continue;
                }
                return None;
            }
            cursor = self.ht[it.table].buckets[it.index];
            it.index += 1;
        }

        let entry = self.slots.get(cursor?)?.as_ref()?;
        it.next = entry.next;
        Some((&entry.key, &entry.value))
    }

    /// Hands a cursor back.
    ///
    /// For an unsafe cursor this is where concurrent modification is
    /// detected.
    pub fn release_iterator(&mut self, it: DictIterator) -> Result<(), DictError> {
        if !it.started {
            return Ok(());
        }
        if it.safe {
            self.iterators = self.iterators.saturating_sub(1);
            return Ok(());
        }

        let actual = self.fingerprint();
        if actual != it.fingerprint {
            error!(
                expected = it.fingerprint,
                actual, "Dict modified during unsafe iteration"
            );
            return Err(DictError::FingerprintMismatch {
                expected: it.fingerprint,
                actual,
            });
        }
        Ok(())
    }

    /// Borrowing iterator over all entries, `ht[0]` first.
    pub fn iter(&self) -> Iter<'_, K, V, T> {
        Iter {
            dict: self,
            table: 0,
            index: 0,
            next: None,
        }
    }

    /// Summary of the table shape: generation tokens, sizes and fill.
    pub fn fingerprint(&self) -> u64 {
        let integers = [
            self.ht[0].token,
            self.ht[0].size() as u64,
            self.ht[0].used as u64,
            self.ht[1].token,
            self.ht[1].size() as u64,
            self.ht[1].used as u64,
        ];

        // Tomas Wang's 64 bit integer hash, folded over the six fields
        let mut hash: u64 = 0;
        for value in integers {
            hash = hash.wrapping_add(value);
            hash = (!hash).wrapping_add(hash << 21);
            hash ^= hash >> 24;
            hash = hash.wrapping_add(hash << 3).wrapping_add(hash << 8);
            hash ^= hash >> 14;
            hash = hash.wrapping_add(hash << 2).wrapping_add(hash << 4);
            hash ^= hash >> 28;
            hash = hash.wrapping_add(hash << 31);
        }
        hash
    }

    fn rehash_step(&mut self) {
        if self.iterators == 0 {
            self.rehash(DICT_REHASH_STEP);
        }
    }

    /// Finds the slot holding `key`, doing one rehash step on the way.
    fn find(&mut self, key: &K) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        self.rehash_step();

        let hash = self.dict_type.hash(key);
        for table in 0..2 {
            let ht = &self.ht[table];
            if ht.size() == 0 {
                break;
            }
            let mut cursor = ht.buckets[ht.bucket_of(hash)];
            while let Some(idx) = cursor {
                let entry = self.entry(idx);
                if self.keys_match(&entry.key, key) {
                    return Some(idx);
                }
                cursor = entry.next;
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    /// Bucket where `key` should be inserted in the active generation, or
    /// `KeyExists` if either generation already holds it.
    fn free_bucket(&self, hash: u64, key: &K) -> Result<usize, DictError> {
        let mut bucket = 0;
        for table in 0..2 {
            let ht = &self.ht[table];
            bucket = ht.bucket_of(hash);
            let mut cursor = ht.buckets[bucket];
            while let Some(idx) = cursor {
                let entry = self.entry(idx);
                if self.keys_match(&entry.key, key) {
                    return Err(DictError::KeyExists);
                }
                cursor = entry.next;
            }
            if !self.is_rehashing() {
                break;
            }
        }
        Ok(bucket)
    }

    #[inline]
    fn keys_match(&self, a: &K, b: &K) -> bool {
        std::ptr::eq(a, b) || self.dict_type.compare(a, b) == Ordering::Equal
    }

    fn alloc(&mut self, entry: Entry<K, V>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(entry);
                idx
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> Entry<K, V> {
        match self.slots[idx].take() {
            Some(entry) => {
                self.free.push(idx);
                entry
            }
            None => unreachable!("dict slot {idx} released twice"),
        }
    }

    fn entry(&self, idx: usize) -> &Entry<K, V> {
        match &self.slots[idx] {
            Some(entry) => entry,
            None => unreachable!("dict chain points at vacant slot {idx}"),
        }
    }

    fn entry_mut(&mut self, idx: usize) -> &mut Entry<K, V> {
        match &mut self.slots[idx] {
            Some(entry) => entry,
            None => unreachable!("dict chain points at vacant slot {idx}"),
        }
    }
}

/// Borrowing iterator returned by [`Dict::iter`].
pub struct Iter<'a, K, V, T> {
    dict: &'a Dict<K, V, T>,
    table: usize,
    index: usize,
    next: Option<usize>,
}

impl<'a, K, V, T> Iterator for Iter<'a, K, V, T> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let dict = self.dict;
        let mut cursor = self.next.take();
        while cursor.is_none() {
            let ht = &dict.ht[self.table];
            if self.index >= ht.size() {
                if self.table == 1 {
                    return None;
                }
                self.table = 1;
                self.index = 0;
                continue;
            }
            cursor = ht.buckets[self.index];
            self.index += 1;
        }

        let entry = dict.slots.get(cursor?)?.as_ref()?;
        self.next = entry.next;
        Some((&entry.key, &entry.value))
    }
}

/// Smallest power of two that is at least `size` and at least the initial size.
fn next_power(size: usize) -> usize {
    size.max(DICT_HT_INITIAL_SIZE)
        .checked_next_power_of_two()
        .unwrap_or(1 << (usize::BITS - 1))
}
