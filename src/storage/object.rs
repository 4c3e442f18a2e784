//! Stored Values
//!
//! Every key and value held by a database is an [`Object`]. Keys are always
//! string-like; values can be any variant. The command table reuses the same
//! dict machinery, so command descriptors are objects too.

use crate::commands::CommandSpec;
use crate::protocol::EncodeData;
use crate::storage::dict::{Dict, DictType};
use crate::storage::sds::Sds;
use crate::storage::zset::SortedSet;
use bytes::Bytes;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

/// Dict keyed and valued by objects (keyspace, hash values).
pub type ObjectDict = Dict<Object, Object, ObjectDictType>;

/// Dict used as a set of objects.
pub type ObjectSet = Dict<Object, (), ObjectDictType>;

#[derive(Debug)]
pub enum Object {
    Str(String),
    Sds(Sds),
    Int(i64),
    List(VecDeque<Object>),
    Set(Box<ObjectSet>),
    SortedSet(Box<SortedSet>),
    Hash(Box<ObjectDict>),
    Command(&'static CommandSpec),
}

impl Object {
    pub fn new_set() -> Self {
        Object::Set(Box::new(Dict::new(ObjectDictType)))
    }

    pub fn new_hash() -> Self {
        Object::Hash(Box::new(Dict::new(ObjectDictType)))
    }

    pub fn new_sorted_set() -> Self {
        Object::SortedSet(Box::default())
    }

    /// String value for `bytes`. Canonical decimal integers are stored as
    /// `Int` so counters need no reparse.
    pub fn string_from_bytes(bytes: &[u8]) -> Self {
        let as_int = std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|n| n.to_string().as_bytes() == bytes);
        match as_int {
            Some(n) => Object::Int(n),
            None => Object::Sds(Sds::new(bytes)),
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut VecDeque<Object>> {
        match self {
            Object::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_set_mut(&mut self) -> Option<&mut ObjectSet> {
        match self {
            Object::Set(set) => Some(set.as_mut()),
            _ => None,
        }
    }

    pub fn as_hash_mut(&mut self) -> Option<&mut ObjectDict> {
        match self {
            Object::Hash(hash) => Some(hash.as_mut()),
            _ => None,
        }
    }

    pub fn as_zset_mut(&mut self) -> Option<&mut SortedSet> {
        match self {
            Object::SortedSet(zset) => Some(zset.as_mut()),
            _ => None,
        }
    }

    /// Name reported by `TYPE`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Str(_) | Object::Sds(_) | Object::Int(_) => "string",
            Object::List(_) => "list",
            Object::Set(_) => "set",
            Object::SortedSet(_) => "zset",
            Object::Hash(_) => "hash",
            Object::Command(_) => "command",
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Object::Str(_) | Object::Sds(_) | Object::Int(_))
    }

    /// Byte content of a string-like object; integers render in decimal.
    pub fn as_bytes(&self) -> Option<Cow<'_, [u8]>> {
        match self {
            Object::Str(s) => Some(Cow::Borrowed(s.as_bytes())),
            Object::Sds(s) => Some(Cow::Borrowed(s.as_bytes())),
            Object::Int(n) => Some(Cow::Owned(n.to_string().into_bytes())),
            _ => None,
        }
    }

    /// Integer value of a string-like object, if it parses.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Object::Int(n) => Some(*n),
            _ => std::str::from_utf8(&self.as_bytes()?).ok()?.parse().ok(),
        }
    }

    /// Copy of a string-like object, used to keep a key while the
    /// original is removed. Containers yield `None`.
    pub fn dup_string(&self) -> Option<Object> {
        match self {
            Object::Str(s) => Some(Object::Str(s.clone())),
            Object::Sds(s) => Some(Object::Sds(s.clone())),
            Object::Int(n) => Some(Object::Int(*n)),
            _ => None,
        }
    }

    /// Reply form of a string-like object (bulk) or `None` for containers.
    pub fn to_reply(&self) -> Option<EncodeData> {
        self.as_bytes()
            .map(|bytes| EncodeData::Bulk(Bytes::copy_from_slice(&bytes)))
    }

    fn tag(&self) -> u8 {
        match self {
            Object::Str(_) | Object::Sds(_) | Object::Int(_) => 0,
            Object::List(_) => 1,
            Object::Set(_) => 2,
            Object::SortedSet(_) => 3,
            Object::Hash(_) => 4,
            Object::Command(_) => 5,
        }
    }
}

impl From<&str> for Object {
    fn from(s: &str) -> Self {
        Object::Sds(Sds::from(s))
    }
}

impl From<Bytes> for Object {
    fn from(data: Bytes) -> Self {
        Object::Sds(Sds::from(data))
    }
}

impl From<&Bytes> for Object {
    fn from(data: &Bytes) -> Self {
        Object::Sds(Sds::new(data))
    }
}

impl From<Sds> for Object {
    fn from(s: Sds) -> Self {
        Object::Sds(s)
    }
}

/// Dict behaviour for object keys. String-likes hash and compare by their
/// bytes, so `Str("5")`, `Sds("5")` and `Int(5)` are one key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectDictType;

impl DictType<Object> for ObjectDictType {
    fn hash(&self, key: &Object) -> u64 {
        let mut hasher = DefaultHasher::new();
        match (key, key.as_bytes()) {
            (_, Some(bytes)) => bytes.hash(&mut hasher),
            (Object::Command(spec), None) => spec.name.hash(&mut hasher),
            (other, None) => other.tag().hash(&mut hasher),
        }
        hasher.finish()
    }

    fn compare(&self, a: &Object, b: &Object) -> Ordering {
        match (a, b) {
            (Object::Command(x), Object::Command(y)) => x.name.cmp(y.name),
            _ => match (a.as_bytes(), b.as_bytes()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => a.tag().cmp(&b.tag()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_likes_are_one_key() {
        let mut dict: ObjectDict = Dict::new(ObjectDictType);
        dict.add(Object::Int(5), Object::from("five")).unwrap();

        assert!(dict.contains_key(&Object::from("5")));
        assert!(dict.contains_key(&Object::Str("5".into())));
        assert!(dict.add(Object::Str("5".into()), Object::Int(0)).is_err());
        assert!(!dict.contains_key(&Object::from("6")));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Object::from("x").type_name(), "string");
        assert_eq!(Object::Int(1).type_name(), "string");
        assert_eq!(Object::List(VecDeque::new()).type_name(), "list");
        assert_eq!(Object::new_set().type_name(), "set");
        assert_eq!(Object::new_sorted_set().type_name(), "zset");
        assert_eq!(Object::new_hash().type_name(), "hash");
    }

    #[test]
    fn test_to_i64() {
        assert_eq!(Object::from("42").to_i64(), Some(42));
        assert_eq!(Object::from("-7").to_i64(), Some(-7));
        assert_eq!(Object::Int(9).to_i64(), Some(9));
        assert_eq!(Object::from("4x").to_i64(), None);
        assert_eq!(Object::new_hash().to_i64(), None);
    }

    #[test]
    fn test_to_reply() {
        assert_eq!(
            Object::Int(12).to_reply(),
            Some(EncodeData::Bulk(Bytes::from("12")))
        );
        assert_eq!(Object::List(VecDeque::new()).to_reply(), None);
    }

    #[test]
    fn test_string_from_bytes_encoding() {
        assert!(matches!(Object::string_from_bytes(b"42"), Object::Int(42)));
        assert!(matches!(Object::string_from_bytes(b"-3"), Object::Int(-3)));
        // non-canonical forms keep their bytes
        assert!(matches!(Object::string_from_bytes(b"007"), Object::Sds(_)));
        assert!(matches!(Object::string_from_bytes(b"+1"), Object::Sds(_)));
        assert!(matches!(Object::string_from_bytes(b"abc"), Object::Sds(_)));
    }

    #[test]
    fn test_dup_string() {
        let key = Object::from("k");
        let copy = key.dup_string().unwrap();
        assert_eq!(ObjectDictType.compare(&key, &copy), Ordering::Equal);
        assert!(Object::new_set().dup_string().is_none());
    }
}
