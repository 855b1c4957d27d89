//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and clearing cached envelopes.

pub mod get;
pub mod remove;

pub use get::{CacheGetParams, get_impl};
pub use remove::{CacheRemoveParams, remove_impl};
