//! Coalescing of concurrent fetches of the same locator.
//!
//! Pending fetches are keyed by locator and mode, never by cache key: flat
//! keys of distinct locators may coincide, and a slot must only ever be bound
//! to its own locator's content.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::Error;
use crate::fetch::{FetchMode, FetchedResource, ResourceFetcher};

/// Result shared between every waiter of one fetch.
pub type SharedResult = Result<Arc<FetchedResource>, Arc<Error>>;

type PendingFetch = Shared<BoxFuture<'static, SharedResult>>;

type FetchId = (String, FetchMode);

/// Registry of fetches currently on the wire, by locator and mode.
#[derive(Clone, Default)]
pub struct InFlight {
    pending: Arc<Mutex<HashMap<FetchId, PendingFetch>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch `locator`, or join the fetch of it already pending in `mode`.
    pub async fn fetch(&self, locator: &str, mode: FetchMode, fetcher: Arc<dyn ResourceFetcher>) -> SharedResult {
        let id: FetchId = (locator.to_string(), mode);
        let pending = {
            let mut map = self.lock();
            match map.get(&id) {
                Some(existing) => {
                    tracing::debug!("joining in-flight fetch for {}", locator);
                    existing.clone()
                }
                None => {
                    let owned = locator.to_string();
                    let fetch = async move { fetcher.fetch(&owned, mode).await.map(Arc::new).map_err(Arc::new) }
                        .boxed()
                        .shared();
                    map.insert(id.clone(), fetch.clone());
                    fetch
                }
            }
        };

        let result = pending.clone().await;

        let mut map = self.lock();
        if map.get(&id).is_some_and(|current| current.ptr_eq(&pending)) {
            map.remove(&id);
        }

        result
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<FetchId, PendingFetch>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
