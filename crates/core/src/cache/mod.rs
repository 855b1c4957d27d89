//! Persistent cache of resource envelopes.
//!
//! - Cache key derivation (flat rewrite or SHA-256)
//! - Envelope codec that degrades instead of failing
//! - `PersistentStore` contract with SQLite and in-memory implementations

pub mod connection;
pub mod entries;
pub mod envelope;
pub mod key;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheEntry;
pub use envelope::{Content, ContentEnvelope, decode, encode};
pub use key::{CacheKey, KeyStrategy, derive_cache_key, derive_hashed_key};
pub use store::{MemoryStore, PersistentStore};
