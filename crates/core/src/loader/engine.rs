//! Stale-while-revalidate engine.
//!
//! Per reference:
//!
//! - miss: fetch, persist, materialize, bind (`Stored`); a failed fetch leaves
//!   the slot unbound (`Unresolved`)
//! - hit: materialize and bind from the store immediately (`Served`), then
//!   after the settle delay fetch again in the background (`Revalidating`);
//!   drifted content overwrites the entry and, one more settle delay later,
//!   asks the host for a full reload
//!
//! Background failures never surface beyond a log line.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;

use super::events::{EventSink, HostEvent};
use super::inflight::{InFlight, SharedResult};
use super::materialize::{EphemeralHandle, Materializer, MaterializerConfig, Slot};
use super::ready::ReadyGate;
use super::reference::ResourceReference;
use crate::Error;
use crate::cache::{CacheKey, Content, ContentEnvelope, KeyStrategy, PersistentStore, decode, encode};
use crate::fetch::{FetchedResource, ResourceFetcher};
use crate::media::resolve_media_type;

/// Engine settings.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Pause between serving cached content and revalidating it, and between
    /// detecting drift and signaling a reload.
    pub settle_delay: Duration,
    pub key_strategy: KeyStrategy,
    /// Share one fetch between concurrent loads of the same locator.
    pub coalesce_fetches: bool,
    pub revalidate_icons: bool,
    pub materializer: MaterializerConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1000),
            key_strategy: KeyStrategy::Flat,
            coalesce_fetches: true,
            revalidate_icons: false,
            materializer: MaterializerConfig::default(),
        }
    }
}

/// Lifecycle position of one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceState {
    Idle,
    Fetching,
    Served,
    Revalidating,
    Stored,
    Unresolved,
}

/// Result of a background revalidation.
#[derive(Debug, Clone)]
pub enum Revalidation {
    /// Remote content matches the stored content.
    Unchanged,
    /// Entry overwritten and a reload signaled.
    Drifted,
    /// Fetch or overwrite failed; the served content stays.
    Failed(Arc<Error>),
}

impl Revalidation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Revalidation::Unchanged => "unchanged",
            Revalidation::Drifted => "drifted",
            Revalidation::Failed(_) => "failed",
        }
    }
}

/// Result of loading one reference.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Fetched on a miss, persisted and bound.
    Stored { key: CacheKey, handle: EphemeralHandle },
    /// Bound from the store; revalidation runs in the background unless the
    /// role is exempt.
    Served { key: CacheKey, handle: EphemeralHandle, revalidation: Option<JoinHandle<Revalidation>> },
    /// The initial fetch failed; the slot stays unbound.
    Unresolved { key: CacheKey, error: Arc<Error> },
}

impl LoadOutcome {
    pub fn key(&self) -> &CacheKey {
        match self {
            LoadOutcome::Stored { key, .. } | LoadOutcome::Served { key, .. } | LoadOutcome::Unresolved { key, .. } => {
                key
            }
        }
    }

    pub fn handle(&self) -> Option<&EphemeralHandle> {
        match self {
            LoadOutcome::Stored { handle, .. } | LoadOutcome::Served { handle, .. } => Some(handle),
            LoadOutcome::Unresolved { .. } => None,
        }
    }

    pub fn state(&self) -> ReferenceState {
        match self {
            LoadOutcome::Stored { .. } => ReferenceState::Stored,
            LoadOutcome::Served { .. } => ReferenceState::Served,
            LoadOutcome::Unresolved { .. } => ReferenceState::Unresolved,
        }
    }

    /// Take the background revalidation task, if one was scheduled.
    pub fn take_revalidation(&mut self) -> Option<JoinHandle<Revalidation>> {
        match self {
            LoadOutcome::Served { revalidation, .. } => revalidation.take(),
            _ => None,
        }
    }
}

/// One reference of a page load with its slot and outcome.
#[derive(Debug)]
pub struct LoadedReference {
    pub reference: ResourceReference,
    pub slot: Arc<Slot>,
    pub outcome: LoadOutcome,
}

/// Result of [`Loader::load_page`].
#[derive(Debug)]
pub struct PageLoad {
    pub references: Vec<LoadedReference>,
    pub gate: ReadyGate,
}

struct LoaderInner {
    store: Arc<dyn PersistentStore>,
    fetcher: Arc<dyn ResourceFetcher>,
    materializer: Materializer,
    inflight: InFlight,
    events: EventSink,
    config: LoaderConfig,
}

/// Revalidation engine over a store and a fetcher. Cheap to clone.
#[derive(Clone)]
pub struct Loader {
    inner: Arc<LoaderInner>,
}

impl Loader {
    pub fn new(
        store: Arc<dyn PersistentStore>, fetcher: Arc<dyn ResourceFetcher>, config: LoaderConfig, events: EventSink,
    ) -> Self {
        let materializer = Materializer::new(config.materializer.clone());
        Self {
            inner: Arc::new(LoaderInner { store, fetcher, materializer, inflight: InFlight::new(), events, config }),
        }
    }

    pub fn materializer(&self) -> &Materializer {
        &self.inner.materializer
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    pub fn cache_key(&self, locator: &str) -> CacheKey {
        self.inner.config.key_strategy.derive(locator)
    }

    /// Load every reference of a page concurrently behind one ready gate.
    pub async fn load_page(&self, references: Vec<ResourceReference>) -> PageLoad {
        let gate = ReadyGate::new(references.len(), self.inner.events.clone());
        let slots: Vec<Arc<Slot>> = references
            .iter()
            .enumerate()
            .map(|(id, reference)| Arc::new(Slot::new(id, reference.role)))
            .collect();

        let outcomes = join_all(
            references
                .iter()
                .zip(&slots)
                .map(|(reference, slot)| self.load(reference, slot, &gate)),
        )
        .await;

        let references = references
            .into_iter()
            .zip(slots)
            .zip(outcomes)
            .map(|((reference, slot), outcome)| LoadedReference { reference, slot, outcome })
            .collect();

        PageLoad { references, gate }
    }

    /// Run the protocol for one reference.
    pub async fn load(&self, reference: &ResourceReference, slot: &Slot, gate: &ReadyGate) -> LoadOutcome {
        let key = self.cache_key(&reference.locator);
        tracing::debug!(key = %key, state = ?ReferenceState::Idle, "looking up {}", reference.locator);

        match self.lookup(&key).await {
            Some(envelope) => self.serve_cached(reference, key, envelope, slot, gate),
            None => self.fetch_initial(reference, key, slot, gate).await,
        }
    }

    async fn lookup(&self, key: &CacheKey) -> Option<ContentEnvelope> {
        match self.inner.store.get(key).await {
            Ok(Some(raw)) => {
                let envelope = decode(&raw);
                if envelope.is_degraded() {
                    tracing::warn!("unreadable entry for {}, treating as miss", key);
                    return None;
                }
                Some(envelope)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("store read failed for {}: {}", key, e);
                None
            }
        }
    }

    fn serve_cached(
        &self, reference: &ResourceReference, key: CacheKey, envelope: ContentEnvelope,
        slot: &Slot, gate: &ReadyGate,
    ) -> LoadOutcome {
        tracing::debug!(key = %key, state = ?ReferenceState::Served, "cache hit for {}", reference.locator);

        let handle = self.inner.materializer.materialize(&envelope);
        self.inner.materializer.bind(slot, handle.clone(), gate);

        let revalidation = if reference.role.revalidates() || self.inner.config.revalidate_icons {
            let loader = self.clone();
            let reference = reference.clone();
            let key = key.clone();
            Some(tokio::spawn(async move { loader.revalidate(reference, key, envelope).await }))
        } else {
            tracing::debug!("{} is immutable once cached, skipping revalidation", key);
            None
        };

        LoadOutcome::Served { key, handle, revalidation }
    }

    async fn fetch_initial(
        &self, reference: &ResourceReference, key: CacheKey, slot: &Slot, gate: &ReadyGate,
    ) -> LoadOutcome {
        tracing::debug!(key = %key, state = ?ReferenceState::Fetching, "cache miss for {}", reference.locator);

        let resource = match self.fetch(reference).await {
            Ok(resource) => resource,
            Err(error) => {
                tracing::warn!(
                    key = %key,
                    state = ?ReferenceState::Unresolved,
                    "fetch failed for {}: {}",
                    reference.locator,
                    error
                );
                gate.settle_failed();
                return LoadOutcome::Unresolved { key, error };
            }
        };

        let envelope = envelope_for(reference, &resource);
        if let Err(e) = self.inner.store.set(&key, &encode(&envelope)).await {
            tracing::warn!("failed to persist {}: {}", key, e);
        }

        let handle = self.inner.materializer.materialize(&envelope);
        self.inner.materializer.bind(slot, handle.clone(), gate);
        tracing::debug!(
            key = %key,
            state = ?ReferenceState::Stored,
            "stored {} ({} bytes)",
            reference.locator,
            envelope.content.len()
        );

        LoadOutcome::Stored { key, handle }
    }

    async fn revalidate(self, reference: ResourceReference, key: CacheKey, served: ContentEnvelope) -> Revalidation {
        tokio::time::sleep(self.inner.config.settle_delay).await;
        tracing::debug!(key = %key, state = ?ReferenceState::Revalidating, "revalidating {}", reference.locator);

        let resource = match self.fetch(&reference).await {
            Ok(resource) => resource,
            Err(error) => {
                tracing::debug!("revalidation fetch failed for {}: {}", reference.locator, error);
                return Revalidation::Failed(error);
            }
        };

        let fresh = envelope_for(&reference, &resource);
        let current = match self.inner.store.get(&key).await {
            Ok(Some(raw)) => decode(&raw),
            _ => served,
        };

        if fresh.content.as_bytes() == current.content.as_bytes() {
            tracing::debug!("{} unchanged", key);
            return Revalidation::Unchanged;
        }

        // A reload without the new entry in place would serve the stale copy again.
        if let Err(e) = self.inner.store.set(&key, &encode(&fresh)).await {
            tracing::warn!("failed to overwrite {}: {}", key, e);
            return Revalidation::Failed(Arc::new(e));
        }

        tracing::info!("{} changed upstream, reload scheduled", key);
        tokio::time::sleep(self.inner.config.settle_delay).await;
        self.inner.events.emit(HostEvent::Reload { key });

        Revalidation::Drifted
    }

    async fn fetch(&self, reference: &ResourceReference) -> SharedResult {
        let mode = reference.role.fetch_mode();
        let resource = if self.inner.config.coalesce_fetches {
            self.inner
                .inflight
                .fetch(&reference.locator, mode, self.inner.fetcher.clone())
                .await?
        } else {
            let resource = self.inner.fetcher.fetch(&reference.locator, mode).await?;
            Arc::new(resource)
        };

        if !resource.is_success() {
            return Err(Arc::new(Error::FetchFailed(resource.status)));
        }
        Ok(resource)
    }
}

fn envelope_for(reference: &ResourceReference, resource: &FetchedResource) -> ContentEnvelope {
    let content = Content::from_body(resource.body.clone(), reference.role.fetch_mode());
    let media_type = resolve_media_type(resource.content_type.as_deref(), &reference.locator);
    ContentEnvelope::new(content, media_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::derive_cache_key;
    use crate::loader::materialize::ReleasePolicy;
    use crate::loader::testing::{CountingStore, FakeFetcher};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::Instant;

    const SETTLE: Duration = Duration::from_millis(1000);

    struct Harness {
        loader: Loader,
        store: Arc<CountingStore>,
        fetcher: Arc<FakeFetcher>,
        events: UnboundedReceiver<HostEvent>,
    }

    fn harness(fetcher: FakeFetcher, config: LoaderConfig) -> Harness {
        let store = Arc::new(CountingStore::new());
        let fetcher = Arc::new(fetcher);
        let (sink, events) = EventSink::channel();
        let loader = Loader::new(store.clone(), fetcher.clone(), config, sink);
        Harness { loader, store, fetcher, events }
    }

    fn reloads(events: &mut UnboundedReceiver<HostEvent>) -> usize {
        let mut count = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, HostEvent::Reload { .. }) {
                count += 1;
            }
        }
        count
    }

    async fn seed(store: &CountingStore, locator: &str, text: &str, mime: &str) {
        let envelope = ContentEnvelope::new(Content::Text(text.into()), mime);
        store.seed(&derive_cache_key(locator), &encode(&envelope)).await;
    }

    fn bound_text(loader: &Loader, slot: &Slot) -> Option<(Content, String)> {
        let handle = slot.handle()?;
        let realized = loader.materializer().registry().resolve(&handle)?;
        Some((realized.content.clone(), realized.media_type.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_cache_fetches_writes_and_binds_once() {
        let mut h = harness(FakeFetcher::text("body{}"), LoaderConfig::default());
        let slot = Slot::new(0, crate::ResourceRole::Stylesheet);
        let gate = ReadyGate::new(1, EventSink::discard());

        let outcome = h.loader.load(&ResourceReference::stylesheet("/app/style.css"), &slot, &gate).await;

        assert_eq!(outcome.state(), ReferenceState::Stored);
        assert_eq!(h.fetcher.calls(), 1);
        assert_eq!(h.store.writes(), 1);
        assert_eq!(h.loader.materializer().registry().live_count(), 1);
        assert_eq!(outcome.handle(), slot.handle().as_ref());
        assert_eq!(reloads(&mut h.events), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_without_content_type_uses_extension_table() {
        let h = harness(FakeFetcher::text("body{}"), LoaderConfig::default());
        let slot = Slot::new(0, crate::ResourceRole::Stylesheet);
        let gate = ReadyGate::new(1, EventSink::discard());

        h.loader.load(&ResourceReference::stylesheet("/app/style.css"), &slot, &gate).await;

        let raw = h.store.raw(&derive_cache_key("/app/style.css")).await.unwrap();
        let stored = decode(&raw);
        assert_eq!(stored.media_type.as_deref(), Some("text/css"));
        assert_eq!(stored.content, Content::Text("body{}".into()));

        let (content, mime) = bound_text(&h.loader, &slot).unwrap();
        assert_eq!(content, Content::Text("body{}".into()));
        assert_eq!(mime, "text/css");
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_leaves_slot_unbound() {
        let mut h = harness(FakeFetcher::failing(), LoaderConfig::default());
        let slot = Slot::new(0, crate::ResourceRole::Script);
        let gate = ReadyGate::new(1, EventSink::discard());
        let reference = ResourceReference::script("https://cdn.example/a/../b/app.js");

        let outcome = h.loader.load(&reference, &slot, &gate).await;

        assert!(matches!(outcome, LoadOutcome::Unresolved { .. }));
        assert_eq!(outcome.key().as_str(), "-b-app.js");
        assert_eq!(h.store.writes(), 0);
        assert_eq!(h.store.len().await, 0);
        assert!(!slot.is_bound());
        assert!(gate.is_ready());
        assert_eq!(gate.failed_count(), 1);

        tokio::time::sleep(SETTLE * 5).await;
        assert_eq!(reloads(&mut h.events), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_success_status_is_failure() {
        let h = harness(FakeFetcher::status(404), LoaderConfig::default());
        let slot = Slot::new(0, crate::ResourceRole::Script);
        let gate = ReadyGate::new(1, EventSink::discard());

        let outcome = h.loader.load(&ResourceReference::script("/missing.js"), &slot, &gate).await;

        match outcome {
            LoadOutcome::Unresolved { error, .. } => assert!(matches!(*error, Error::FetchFailed(404))),
            other => panic!("expected unresolved, got {other:?}"),
        }
        assert_eq!(h.store.writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opaque_status_is_success() {
        let h = harness(FakeFetcher::status(0), LoaderConfig::default());
        let slot = Slot::new(0, crate::ResourceRole::Script);
        let gate = ReadyGate::new(1, EventSink::discard());

        let outcome = h.loader.load(&ResourceReference::script("local.js"), &slot, &gate).await;
        assert_eq!(outcome.state(), ReferenceState::Stored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warm_unchanged_serves_then_revalidates_once() {
        let mut h = harness(FakeFetcher::text("body{}"), LoaderConfig::default());
        seed(&h.store, "/app/style.css", "body{}", "text/css").await;
        let slot = Slot::new(0, crate::ResourceRole::Stylesheet);
        let gate = ReadyGate::new(1, EventSink::discard());

        let start = Instant::now();
        let mut outcome = h.loader.load(&ResourceReference::stylesheet("/app/style.css"), &slot, &gate).await;

        assert_eq!(outcome.state(), ReferenceState::Served);
        assert!(slot.is_bound());
        assert_eq!(h.fetcher.calls(), 0);

        let result = outcome.take_revalidation().unwrap().await.unwrap();
        assert!(matches!(result, Revalidation::Unchanged));
        assert_eq!(h.fetcher.calls(), 1);
        assert!(h.fetcher.called_at()[0] >= start + SETTLE);
        assert_eq!(h.store.writes(), 0);
        assert_eq!(reloads(&mut h.events), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warm_changed_overwrites_and_reloads_after_settle() {
        let mut h = harness(FakeFetcher::text("body{color:red}"), LoaderConfig::default());
        seed(&h.store, "/app/style.css", "body{}", "text/css").await;
        let slot = Slot::new(0, crate::ResourceRole::Stylesheet);
        let gate = ReadyGate::new(1, EventSink::discard());

        let mut outcome = h.loader.load(&ResourceReference::stylesheet("/app/style.css"), &slot, &gate).await;
        let task = outcome.take_revalidation().unwrap();

        tokio::time::sleep(SETTLE - Duration::from_millis(1)).await;
        assert_eq!(h.fetcher.calls(), 0);
        assert_eq!(h.store.writes(), 0);

        // Overwritten after one settle delay, reload held back until the second.
        tokio::time::sleep(SETTLE).await;
        assert_eq!(h.fetcher.calls(), 1);
        assert_eq!(h.store.writes(), 1);
        assert_eq!(reloads(&mut h.events), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(reloads(&mut h.events), 1);

        let result = task.await.unwrap();
        assert!(matches!(result, Revalidation::Drifted));
        assert_eq!(reloads(&mut h.events), 0);

        let raw = h.store.raw(&derive_cache_key("/app/style.css")).await.unwrap();
        assert_eq!(decode(&raw).content, Content::Text("body{color:red}".into()));

        // The bound handle is not swapped in place.
        assert_eq!(slot.handle().as_ref(), outcome.handle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_unchanged_cycles_never_reload() {
        let mut h = harness(FakeFetcher::text("console.log(1)"), LoaderConfig::default());
        seed(&h.store, "/main.js", "console.log(1)", "application/javascript").await;

        for _ in 0..2 {
            let slot = Slot::new(0, crate::ResourceRole::Script);
            let gate = ReadyGate::new(1, EventSink::discard());
            let mut outcome = h.loader.load(&ResourceReference::script("/main.js"), &slot, &gate).await;
            let result = outcome.take_revalidation().unwrap().await.unwrap();
            assert!(matches!(result, Revalidation::Unchanged));
        }

        assert_eq!(h.fetcher.calls(), 2);
        assert_eq!(h.store.writes(), 0);
        assert_eq!(reloads(&mut h.events), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drift_then_stable_reloads_once() {
        let mut h = harness(FakeFetcher::text("v2"), LoaderConfig::default());
        seed(&h.store, "/main.js", "v1", "application/javascript").await;

        for _ in 0..2 {
            let slot = Slot::new(0, crate::ResourceRole::Script);
            let gate = ReadyGate::new(1, EventSink::discard());
            let mut outcome = h.loader.load(&ResourceReference::script("/main.js"), &slot, &gate).await;
            outcome.take_revalidation().unwrap().await.unwrap();
        }

        assert_eq!(h.store.writes(), 1);
        assert_eq!(reloads(&mut h.events), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_change_between_visits() {
        let mut h = harness(FakeFetcher::text("v1"), LoaderConfig::default());
        seed(&h.store, "/main.js", "v1", "application/javascript").await;

        let slot = Slot::new(0, crate::ResourceRole::Script);
        let gate = ReadyGate::new(1, EventSink::discard());
        let mut first = h.loader.load(&ResourceReference::script("/main.js"), &slot, &gate).await;
        assert!(matches!(first.take_revalidation().unwrap().await.unwrap(), Revalidation::Unchanged));

        h.fetcher.set_text("v2");
        let slot = Slot::new(0, crate::ResourceRole::Script);
        let gate = ReadyGate::new(1, EventSink::discard());
        let mut second = h.loader.load(&ResourceReference::script("/main.js"), &slot, &gate).await;
        assert!(matches!(second.take_revalidation().unwrap().await.unwrap(), Revalidation::Drifted));

        assert_eq!(h.store.writes(), 1);
        assert_eq!(reloads(&mut h.events), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revalidation_failure_is_silent() {
        let mut h = harness(FakeFetcher::failing(), LoaderConfig::default());
        seed(&h.store, "/app/style.css", "body{}", "text/css").await;
        let slot = Slot::new(0, crate::ResourceRole::Stylesheet);
        let gate = ReadyGate::new(1, EventSink::discard());

        let mut outcome = h.loader.load(&ResourceReference::stylesheet("/app/style.css"), &slot, &gate).await;
        let result = outcome.take_revalidation().unwrap().await.unwrap();

        assert!(matches!(result, Revalidation::Failed(_)));
        assert!(slot.is_bound());
        assert_eq!(h.store.writes(), 0);
        assert_eq!(reloads(&mut h.events), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_icon_hit_skips_revalidation() {
        let h = harness(FakeFetcher::bytes(&[1, 2, 3], "image/x-icon"), LoaderConfig::default());
        let envelope = ContentEnvelope::new(Content::Bytes(vec![9, 9]), "image/x-icon");
        h.store.seed(&derive_cache_key("/favicon.ico"), &encode(&envelope)).await;
        let slot = Slot::new(0, crate::ResourceRole::Icon);
        let gate = ReadyGate::new(1, EventSink::discard());

        let mut outcome = h.loader.load(&ResourceReference::icon("/favicon.ico"), &slot, &gate).await;

        assert_eq!(outcome.state(), ReferenceState::Served);
        assert!(outcome.take_revalidation().is_none());
        tokio::time::sleep(SETTLE * 3).await;
        assert_eq!(h.fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_icon_revalidation_when_enabled() {
        let config = LoaderConfig { revalidate_icons: true, ..Default::default() };
        let h = harness(FakeFetcher::bytes(&[9, 9], "image/x-icon"), config);
        let envelope = ContentEnvelope::new(Content::Bytes(vec![9, 9]), "image/x-icon");
        h.store.seed(&derive_cache_key("/favicon.ico"), &encode(&envelope)).await;
        let slot = Slot::new(0, crate::ResourceRole::Icon);
        let gate = ReadyGate::new(1, EventSink::discard());

        let mut outcome = h.loader.load(&ResourceReference::icon("/favicon.ico"), &slot, &gate).await;
        let result = outcome.take_revalidation().unwrap().await.unwrap();
        assert!(matches!(result, Revalidation::Unchanged));
    }

    #[tokio::test(start_paused = true)]
    async fn test_icon_miss_stored_as_bytes() {
        let h = harness(FakeFetcher::bytes(&[0, 1, 255], "image/png"), LoaderConfig::default());
        let slot = Slot::new(0, crate::ResourceRole::Icon);
        let gate = ReadyGate::new(1, EventSink::discard());

        h.loader.load(&ResourceReference::icon("/logo.png"), &slot, &gate).await;

        let raw = h.store.raw(&derive_cache_key("/logo.png")).await.unwrap();
        assert_eq!(decode(&raw).content, Content::Bytes(vec![0, 1, 255]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupted_entry_treated_as_miss() {
        let h = harness(FakeFetcher::text("fresh"), LoaderConfig::default());
        h.store.seed(&derive_cache_key("/main.js"), "{not json").await;
        let slot = Slot::new(0, crate::ResourceRole::Script);
        let gate = ReadyGate::new(1, EventSink::discard());

        let outcome = h.loader.load(&ResourceReference::script("/main.js"), &slot, &gate).await;

        assert_eq!(outcome.state(), ReferenceState::Stored);
        assert_eq!(h.fetcher.calls(), 1);
        let raw = h.store.raw(&derive_cache_key("/main.js")).await.unwrap();
        assert_eq!(decode(&raw).content, Content::Text("fresh".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_page_coalesces_shared_locator() {
        let h = harness(FakeFetcher::text("x").with_latency(Duration::from_millis(20)), LoaderConfig::default());
        let references = vec![ResourceReference::script("/shared.js"), ResourceReference::script("/shared.js")];

        let page = h.loader.load_page(references).await;

        assert_eq!(h.fetcher.calls(), 1);
        assert!(page.references.iter().all(|r| r.slot.is_bound()));
        assert_eq!(h.store.writes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_colliding_keys_bind_their_own_content() {
        let h = harness(FakeFetcher::echo().with_latency(Duration::from_millis(20)), LoaderConfig::default());
        let references = vec![
            ResourceReference::script("https://a.example/app.js"),
            ResourceReference::script("https://b.example/app.js"),
        ];

        let page = h.loader.load_page(references).await;

        assert_eq!(page.references[0].outcome.key(), page.references[1].outcome.key());
        assert_eq!(h.fetcher.calls(), 2);
        for loaded in &page.references {
            let (content, _) = bound_text(&h.loader, &loaded.slot).unwrap();
            assert_eq!(content, Content::Text(format!("from {}", loaded.reference.locator)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_page_without_coalescing_fetches_each() {
        let config = LoaderConfig { coalesce_fetches: false, ..Default::default() };
        let h = harness(FakeFetcher::text("x").with_latency(Duration::from_millis(20)), config);
        let references = vec![ResourceReference::script("/shared.js"), ResourceReference::script("/shared.js")];

        h.loader.load_page(references).await;

        assert_eq!(h.fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_page_ready_after_bind_and_failure() {
        let mut h = harness(FakeFetcher::text("x"), LoaderConfig::default());
        let page = h
            .loader
            .load_page(vec![ResourceReference::stylesheet("/a.css"), ResourceReference::script("/b.js")])
            .await;
        assert!(!page.gate.is_ready());

        page.gate.wait().await;
        assert!(page.gate.is_ready());
        assert_eq!(h.events.try_recv().ok(), Some(HostEvent::Ready));

        h.fetcher.set_failing();
        let page = h.loader.load_page(vec![ResourceReference::script("/c.js")]).await;
        assert!(page.gate.is_ready());
        assert_eq!(page.gate.failed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hashed_keys() {
        let config = LoaderConfig { key_strategy: KeyStrategy::Hashed, ..Default::default() };
        let h = harness(FakeFetcher::text("x"), config);
        let slot = Slot::new(0, crate::ResourceRole::Script);
        let gate = ReadyGate::new(1, EventSink::discard());

        let outcome = h.loader.load(&ResourceReference::script("/a.js"), &slot, &gate).await;
        assert_eq!(outcome.key().as_str().len(), 64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scoped_policy_keeps_handle_alive() {
        let config = LoaderConfig {
            materializer: MaterializerConfig { release_policy: ReleasePolicy::Scoped, ..Default::default() },
            ..Default::default()
        };
        let h = harness(FakeFetcher::text("x"), config);
        let slot = Slot::new(0, crate::ResourceRole::Script);
        let gate = ReadyGate::new(1, EventSink::discard());

        h.loader.load(&ResourceReference::script("/a.js"), &slot, &gate).await;
        tokio::time::sleep(SETTLE * 10).await;
        assert!(bound_text(&h.loader, &slot).is_some());
    }
}
