//! page_load tool implementation.
//!
//! Scans markup for deferred references and runs the stale-while-revalidate
//! loader over them against the persistent cache.

use std::sync::Arc;

use instapage_client::{FetchClient, scan_page};
use instapage_core::loader::{
    EventSink, HostEvent, LoadOutcome, Loader, LoaderConfig, NavigationType, ReferenceState, ReloadLog,
};
use instapage_core::{Error, PersistentStore, ResourceRole};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Input parameters for page_load tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageLoadParams {
    /// Raw HTML of the page.
    pub html: String,

    /// URL the page was served from; relative locators resolve against it.
    #[serde(default)]
    pub base_url: Option<String>,

    /// How the page was reached. Only `navigate` and `reload` run the loader.
    #[serde(default)]
    pub navigation: NavigationType,

    /// Wait for background revalidation to finish before returning.
    #[serde(default)]
    pub await_revalidation: bool,
}

/// Report for one reference.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReferenceReport {
    pub locator: String,
    pub role: ResourceRole,
    pub key: String,
    /// "cache", "network" or "unresolved".
    pub source: String,
    pub media_type: Option<String>,
    pub handle: Option<String>,
    pub content_length: Option<usize>,
    /// "unchanged", "drifted", "failed", "pending", or absent when no
    /// revalidation was scheduled.
    pub revalidation: Option<String>,
    pub error: Option<String>,
}

/// Output structure for page_load tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageLoadOutput {
    /// Whether the loader ran for this navigation.
    pub ran: bool,
    /// Whether the page carries the opt-in marker.
    pub opted_in: bool,
    pub references: Vec<ReferenceReport>,
    /// Every reference has bound or failed.
    pub ready: bool,
    /// Revalidation found drift and asked for a full reload. Reloads from
    /// revalidations still pending on return are reported by `reload_requests`.
    pub reload_requested: bool,
}

/// Implementation of the page_load tool.
pub async fn page_load_impl(
    store: Arc<dyn PersistentStore>, client: &FetchClient, config: LoaderConfig, reloads: &ReloadLog,
    params: PageLoadParams,
) -> Result<CallToolResult, McpError> {
    let output = run_page_load(store, client, config, reloads, params).await?;
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize page load: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

pub(crate) async fn run_page_load(
    store: Arc<dyn PersistentStore>, client: &FetchClient, config: LoaderConfig, reloads: &ReloadLog,
    params: PageLoadParams,
) -> Result<PageLoadOutput, Error> {
    if params.html.trim().is_empty() {
        return Err(Error::InvalidInput("html must not be empty".into()));
    }

    let base = params
        .base_url
        .as_deref()
        .map(Url::parse)
        .transpose()
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;

    if !params.navigation.runs_loader() {
        tracing::debug!(navigation = ?params.navigation, "loader skipped for this navigation");
        return Ok(PageLoadOutput {
            ran: false,
            opted_in: false,
            references: Vec::new(),
            ready: true,
            reload_requested: false,
        });
    }

    let scan = scan_page(&params.html);
    if !scan.opted_in {
        return Ok(PageLoadOutput {
            ran: false,
            opted_in: false,
            references: Vec::new(),
            ready: true,
            reload_requested: false,
        });
    }

    let (events, mut rx) = EventSink::channel();
    let fetcher = Arc::new(client.with_base_url(base));
    let loader = Loader::new(store, fetcher, config, events);

    let mut page = loader.load_page(scan.references).await;

    // Handles may be released under the delayed policy, so read them first.
    let mut reports: Vec<ReferenceReport> = page
        .references
        .iter()
        .map(|loaded| {
            let realized = loaded
                .outcome
                .handle()
                .and_then(|handle| loader.materializer().registry().resolve(handle));
            let error = match &loaded.outcome {
                LoadOutcome::Unresolved { error, .. } => Some(error.to_string()),
                _ => None,
            };
            ReferenceReport {
                locator: loaded.reference.locator.clone(),
                role: loaded.reference.role,
                key: loaded.outcome.key().to_string(),
                source: source_label(loaded.outcome.state()).to_string(),
                media_type: realized.as_ref().map(|r| r.media_type.clone()),
                handle: loaded.outcome.handle().map(|h| h.url().to_string()),
                content_length: realized.as_ref().map(|r| r.content.len()),
                revalidation: None,
                error,
            }
        })
        .collect();

    page.gate.wait().await;

    let mut detached = false;
    for (report, loaded) in reports.iter_mut().zip(page.references.iter_mut()) {
        let Some(task) = loaded.outcome.take_revalidation() else {
            continue;
        };
        if !params.await_revalidation {
            report.revalidation = Some("pending".into());
            detached = true;
            continue;
        }
        report.revalidation = Some(match task.await {
            Ok(result) => result.as_str().to_string(),
            Err(e) => {
                tracing::warn!("revalidation task for {} ended abnormally: {}", report.key, e);
                "failed".to_string()
            }
        });
    }

    let mut reload_requested = false;
    while let Ok(event) = rx.try_recv() {
        if let HostEvent::Reload { key } = event {
            tracing::info!("reload requested after {} changed", key);
            reload_requested = true;
        }
    }

    // The channel closes once the last pending revalidation finishes.
    if detached {
        let reloads = reloads.clone();
        tokio::spawn(async move { reloads.collect(rx).await });
    }

    Ok(PageLoadOutput {
        ran: true,
        opted_in: true,
        references: reports,
        ready: page.gate.is_ready(),
        reload_requested,
    })
}

fn source_label(state: ReferenceState) -> &'static str {
    match state {
        ReferenceState::Served => "cache",
        ReferenceState::Unresolved => "unresolved",
        _ => "network",
    }
}
