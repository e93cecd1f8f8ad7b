//! Result caching for imgtriage.
//!
//! Hashing and classifying images is expensive, so every computed result is
//! persisted in a single JSON document next to the scanned tree and reused
//! on later runs.
//!
//! # Architecture
//!
//! * [`store`]: Loading, merging and writing the cache document.
//! * [`entry`]: The per-file record stored in the cache.
//!
//! # Cache Invalidation
//!
//! Entries are addressed by identity key, `"{absolute_path}:{size_bytes}"`.
//! A file whose size changes gets a new key and is scored again; its old
//! entry disappears on the next full walk. Entries are never deleted
//! explicitly.

pub mod entry;
pub mod store;

pub use entry::CacheEntry;
pub use store::{CacheError, CacheStore, WalkMode};
