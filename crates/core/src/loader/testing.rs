//! Test doubles for the store and fetch capabilities.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::Error;
use crate::cache::{CacheKey, MemoryStore, PersistentStore};
use crate::fetch::{FetchMode, FetchedResource, ResourceFetcher};

#[derive(Debug, Clone)]
enum Reply {
    Body { status: u16, content_type: Option<String>, body: Vec<u8> },
    Echo,
    NetworkError,
}

/// Fetcher returning a configurable reply and recording when it was called.
#[derive(Debug)]
pub struct FakeFetcher {
    reply: Mutex<Reply>,
    latency: Duration,
    calls: AtomicUsize,
    called_at: Mutex<Vec<Instant>>,
}

impl FakeFetcher {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply: Mutex::new(reply),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            called_at: Mutex::new(Vec::new()),
        }
    }

    pub fn text(body: &str) -> Self {
        Self::with_reply(Reply::Body { status: 200, content_type: None, body: body.as_bytes().to_vec() })
    }

    pub fn bytes(body: &[u8], content_type: &str) -> Self {
        Self::with_reply(Reply::Body { status: 200, content_type: Some(content_type.to_string()), body: body.to_vec() })
    }

    pub fn status(status: u16) -> Self {
        Self::with_reply(Reply::Body { status, content_type: None, body: Vec::new() })
    }

    /// Replies `from <locator>` for every locator.
    pub fn echo() -> Self {
        Self::with_reply(Reply::Echo)
    }

    pub fn failing() -> Self {
        Self::with_reply(Reply::NetworkError)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_text(&self, body: &str) {
        *self.reply.lock().unwrap() = Reply::Body { status: 200, content_type: None, body: body.as_bytes().to_vec() };
    }

    pub fn set_failing(&self) {
        *self.reply.lock().unwrap() = Reply::NetworkError;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn called_at(&self) -> Vec<Instant> {
        self.called_at.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceFetcher for FakeFetcher {
    async fn fetch(&self, locator: &str, _mode: FetchMode) -> Result<FetchedResource, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.called_at.lock().unwrap().push(Instant::now());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Body { status, content_type, body } => Ok(FetchedResource { status, content_type, body }),
            Reply::Echo => Ok(FetchedResource {
                status: 200,
                content_type: None,
                body: format!("from {locator}").into_bytes(),
            }),
            Reply::NetworkError => Err(Error::HttpError(format!("network error: {locator}"))),
        }
    }
}

/// Memory store that counts writes.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn seed(&self, key: &CacheKey, value: &str) {
        self.inner.set(key, value).await.unwrap();
    }

    pub async fn raw(&self, key: &CacheKey) -> Option<String> {
        self.inner.get(key).await.unwrap()
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl PersistentStore for CountingStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, Error> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), Error> {
        self.inner.remove(key).await
    }
}
