//! Network retrieval contract used by the loader.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Status reported for successful reads from local (`file://`) contexts.
pub const OPAQUE_SUCCESS: u16 = 0;

/// How a response body should be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Decode as UTF-8 text.
    Text,
    /// Keep raw bytes (icon images).
    Binary,
}

/// Raw result of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    /// HTTP status, or [`OPAQUE_SUCCESS`] for local reads.
    pub status: u16,
    /// Content-Type header value, if the transport supplied one.
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedResource {
    pub fn is_success(&self) -> bool {
        is_success_status(self.status)
    }
}

/// Any 2xx, or the opaque status used for local contexts.
pub fn is_success_status(status: u16) -> bool {
    status == OPAQUE_SUCCESS || (200..300).contains(&status)
}

/// Fetch capability supplied by the host.
///
/// One GET per call; implementations may return non-success statuses and
/// leave the success decision to the caller.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, locator: &str, mode: FetchMode) -> Result<FetchedResource, Error>;
}
