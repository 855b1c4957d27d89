//! reload_requests tool implementation.
//!
//! Reports reloads raised by revalidations that finished after their
//! page_load call returned.

use instapage_core::Error;
use instapage_core::loader::ReloadLog;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output from the reload_requests tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReloadRequestsOutput {
    /// Keys whose stored content drifted, oldest first.
    pub keys: Vec<String>,
    pub reload_requested: bool,
}

/// Implementation of the reload_requests tool. Reading drains the log.
pub fn reloads_impl(reloads: &ReloadLog) -> Result<CallToolResult, McpError> {
    let output = drain(reloads);
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn drain(reloads: &ReloadLog) -> ReloadRequestsOutput {
    let keys: Vec<String> = reloads.take().into_iter().map(|key| key.into_string()).collect();
    ReloadRequestsOutput { reload_requested: !keys.is_empty(), keys }
}
