//! MCP tool implementations.
//!
//! This module contains all tools exposed by the instapage server.

pub mod cache;
pub mod page_load;
pub mod reloads;

pub use page_load::{PageLoadParams, page_load_impl};
pub use reloads::reloads_impl;
