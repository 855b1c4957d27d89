//! Signals from the loader to the hosting context.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::cache::CacheKey;

/// A request the host is expected to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Every reference has bound or failed; the page may be shown.
    Ready,
    /// Stored content drifted from the remote copy; reload the whole context.
    Reload { key: CacheKey },
}

/// Sending half of the host event channel.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<HostEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops every event.
    pub fn discard() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: HostEvent) {
        let Some(tx) = &self.tx else { return };
        if let Err(e) = tx.send(event) {
            tracing::debug!("host event dropped, receiver closed: {:?}", e.0);
        }
    }
}

/// Reload requests kept for a host that reads them after the load returned.
#[derive(Debug, Clone, Default)]
pub struct ReloadLog {
    keys: Arc<Mutex<Vec<CacheKey>>>,
}

impl ReloadLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: CacheKey) {
        self.lock().push(key);
    }

    /// Record reloads arriving on `rx` until every sender is gone.
    pub async fn collect(&self, mut rx: mpsc::UnboundedReceiver<HostEvent>) {
        while let Some(event) = rx.recv().await {
            if let HostEvent::Reload { key } = event {
                tracing::info!("reload requested after {} changed", key);
                self.record(key);
            }
        }
    }

    /// Drain the recorded requests, oldest first.
    pub fn take(&self) -> Vec<CacheKey> {
        std::mem::take(&mut *self.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CacheKey>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
