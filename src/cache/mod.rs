//! Shared store for rendered tiles and rebuild records.
//!
//! Entries are addressed by a [`CacheKey`]: an ordered tuple of strings whose
//! SHA-256 digest is the storage key. Every entry remembers its layer and tile
//! bounds so it can be invalidated by area.

mod error;
mod key;
mod memory;
mod store;

pub use error::CacheError;
pub use key::{CacheCategory, CacheKey};
pub use memory::InMemoryCacheStore;
pub use store::{CacheEntry, CacheStats, CacheStore, NoOpCacheStore};
