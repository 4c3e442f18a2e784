//! Binary-Safe Dynamic Strings
//!
//! `Sds` is the byte string used for sorted-set members, companion-dict
//! scores and binary-safe string values. It is a plain value object:
//! ordering is byte-wise (shorter prefix sorts first), which is exactly the
//! tie-break rule the skip list needs for equal scores.

use crate::storage::dict::DictType;
use bytes::{Bytes, BytesMut};
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A growable, binary-safe byte string.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sds {
    buf: BytesMut,
}

impl Sds {
    /// Creates a string holding a copy of `data`.
    pub fn new(data: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(data),
        }
    }

    /// Creates an empty string.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates an empty string with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Appends raw bytes.
    pub fn cat(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Appends another sds.
    pub fn cat_sds(&mut self, other: &Sds) {
        self.buf.extend_from_slice(&other.buf);
    }

    /// Replaces the content with `data`, reusing the allocation.
    pub fn copy_from(&mut self, data: &[u8]) {
        self.buf.clear();
        self.buf.extend_from_slice(data);
    }

    /// Lossy UTF-8 view, for logging and replies that need text.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }

    /// Copies the content into an immutable `Bytes` for the wire.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buf)
    }
}

impl From<&str> for Sds {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<&[u8]> for Sds {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}

impl From<Bytes> for Sds {
    fn from(data: Bytes) -> Self {
        Self::new(&data)
    }
}

impl From<Vec<u8>> for Sds {
    fn from(data: Vec<u8>) -> Self {
        Self {
            buf: BytesMut::from(&data[..]),
        }
    }
}

impl AsRef<[u8]> for Sds {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

/// Dict behaviour for `Sds` keys: byte-wise hash and comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct SdsDictType;

impl DictType<Sds> for SdsDictType {
    fn hash(&self, key: &Sds) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.as_bytes().hash(&mut hasher);
        hasher.finish()
    }

    fn compare(&self, a: &Sds, b: &Sds) -> Ordering {
        a.as_bytes().cmp(b.as_bytes())
    }
}

impl fmt::Debug for Sds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sds({:?})", self.to_string_lossy())
    }
}

impl fmt::Display for Sds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_bytewise() {
        let a = Sds::from("abcdefs");
        let b = Sds::from("abcdefse");
        assert!(a < b);
        assert!(Sds::from("b") > Sds::from("abc"));
        assert_eq!(Sds::from("x").cmp(&Sds::from("x")), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_cat_and_copy() {
        let mut s = Sds::from("poiuytersds");
        assert_eq!(s.len(), 11);

        s.cat(b"123213");
        assert_eq!(s.as_bytes(), b"poiuytersds123213");

        s.cat_sds(&Sds::from("!"));
        assert_eq!(s.len(), 18);

        s.copy_from(b"abc");
        assert_eq!(s.to_string(), "abc");
    }

    #[test]
    fn test_binary_safe() {
        let s = Sds::new(b"hel\x00o");
        assert_eq!(s.len(), 5);
        assert_eq!(s.to_bytes(), Bytes::from(&b"hel\x00o"[..]));
    }

    #[test]
    fn test_empty() {
        assert!(Sds::empty().is_empty());
        assert!(Sds::with_capacity(16).is_empty());
    }
}
