//! Storage Module
//!
//! The in-memory data structures behind every database.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Database                                                     │
//! │   dict:    Dict<Object, Object>   key → value                │
//! │   expires: Dict<Object, Object>   key → deadline (unix ms)   │
//! └──────────────────────────────────────────────────────────────┘
//!          │ values
//!          ▼
//!   Object::{Str, Sds, Int, List, Set, Hash, SortedSet, Command}
//!                                         │
//!                                         ▼
//!                        SortedSet = ZSkipList + Dict<Sds, Sds>
//! ```
//!
//! ## Features
//!
//! - **Incremental rehashing**: [`Dict`] grows into a second table and
//!   migrates one bucket per operation, so no single call pays for a full
//!   resize.
//! - **Rank-aware skip list**: [`ZSkipList`] keeps per-level spans for
//!   O(log n) rank queries and range deletions.
//! - **Lazy and active expiry**: lookups drop expired keys; the
//!   [`ExpirySweeper`] sweeps the rest in the background.
//!
//! ## Example
//!
//! ```
//! use quillkv::storage::{Database, Object};
//!
//! let mut db = Database::new(0);
//! db.set(Object::from("name"), Object::from("quill"));
//! assert!(db.exists(&Object::from("name")));
//! assert_eq!(db.lookup(&Object::from("name")).unwrap().type_name(), "string");
//! ```

pub mod db;
pub mod dict;
pub mod expiry;
pub mod object;
pub mod sds;
pub mod zset;
pub mod zskiplist;

pub use db::{Database, Ttl};
pub use dict::{Dict, DictError, DictType};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use object::{Object, ObjectDict, ObjectDictType};
pub use sds::{Sds, SdsDictType};
pub use zset::{SortedSet, ZAddOutcome};
pub use zskiplist::{NodeId, ZRangeSpec, ZSkipList};
