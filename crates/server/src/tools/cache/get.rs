//! cache_get tool implementation.
//!
//! Summarizes the cached envelope for a locator.

use instapage_core::cache::{CacheDb, Content, KeyStrategy, decode};
use instapage_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content as ToolContent},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Locator as written in the page markup.
    pub locator: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub key: String,
    /// Media type the content is realized with.
    pub media_type: String,
    pub content_length: usize,
    /// Whether the content is kept as raw bytes.
    pub binary: bool,
    /// The stored value could not be decoded and will be refetched.
    pub degraded: bool,
    pub updated_at: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(
    cache: &CacheDb, strategy: KeyStrategy, params: CacheGetParams,
) -> Result<CallToolResult, McpError> {
    let output = lookup(cache, strategy, &params).await?;
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize entry: {e}")))?;

    Ok(CallToolResult::success(vec![ToolContent::text(json)]))
}

async fn lookup(cache: &CacheDb, strategy: KeyStrategy, params: &CacheGetParams) -> Result<CacheGetOutput, Error> {
    if params.locator.trim().is_empty() {
        return Err(Error::InvalidInput("locator must not be empty".into()));
    }

    let key = strategy.derive(&params.locator);
    let entry = cache
        .get_entry(key.as_str())
        .await?
        .ok_or_else(|| Error::CacheMiss(key.to_string()))?;

    let envelope = decode(&entry.value);
    Ok(CacheGetOutput {
        key: entry.key,
        media_type: envelope.media_type().to_string(),
        content_length: envelope.content.len(),
        binary: matches!(envelope.content, Content::Bytes(_)),
        degraded: envelope.is_degraded(),
        updated_at: entry.updated_at,
    })
}
