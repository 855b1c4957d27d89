//! Core types and shared functionality for instapage.
//!
//! This crate provides:
//! - Persistent envelope cache with SQLite and in-memory backends
//! - Content-type resolution
//! - The stale-while-revalidate loader
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod media;

pub use cache::{CacheDb, CacheKey, ContentEnvelope, PersistentStore};
pub use config::AppConfig;
pub use error::Error;
pub use fetch::{FetchMode, FetchedResource, ResourceFetcher};
pub use loader::{Loader, ResourceReference, ResourceRole};
