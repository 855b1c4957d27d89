//! cache_remove tool implementation.
//!
//! Drops the cached envelope for a locator so the next load fetches it.

use instapage_core::cache::{CacheDb, KeyStrategy};
use instapage_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_remove tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheRemoveParams {
    /// Locator as written in the page markup.
    pub locator: String,
}

/// Output from the cache_remove tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheRemoveOutput {
    pub key: String,
    /// Whether an entry existed.
    pub removed: bool,
}

/// Implementation of the cache_remove tool.
pub async fn remove_impl(
    cache: &CacheDb, strategy: KeyStrategy, params: CacheRemoveParams,
) -> Result<CallToolResult, McpError> {
    if params.locator.trim().is_empty() {
        return Err(Error::InvalidInput("locator must not be empty".into()).into());
    }

    let key = strategy.derive(&params.locator);
    let deleted = cache.delete_entry(key.as_str()).await?;
    tracing::debug!("removed {} entries for {}", deleted, key);

    let output = CacheRemoveOutput { key: key.into_string(), removed: deleted > 0 };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
