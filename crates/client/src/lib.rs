//! Client code for instapage.
//!
//! This crate provides the resource fetch client and the markup scanner used
//! by the server.

pub mod extract;
pub mod fetch;

pub use extract::{PageScan, scan_page};
pub use fetch::{FetchClient, FetchConfig};
