//! Page readiness tracking.
//!
//! A gate starts hidden and turns ready exactly once, after every expected
//! reference has either bound or definitively failed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::watch;

use super::events::{EventSink, HostEvent};

#[derive(Debug)]
struct GateInner {
    remaining: AtomicUsize,
    failed: AtomicUsize,
    fired: AtomicBool,
    ready_tx: watch::Sender<bool>,
    events: EventSink,
}

/// Countdown over the references of one page load.
#[derive(Debug, Clone)]
pub struct ReadyGate {
    inner: Arc<GateInner>,
}

impl ReadyGate {
    pub fn new(expected: usize, events: EventSink) -> Self {
        let (ready_tx, _) = watch::channel(false);
        let gate = Self {
            inner: Arc::new(GateInner {
                remaining: AtomicUsize::new(expected),
                failed: AtomicUsize::new(0),
                fired: AtomicBool::new(false),
                ready_tx,
                events,
            }),
        };

        if expected == 0 {
            gate.fire();
        }
        gate
    }

    /// A reference bound its slot and the ready delay elapsed.
    pub fn settle_bound(&self) {
        self.settle();
    }

    /// A reference will never bind.
    pub fn settle_failed(&self) {
        self.inner.failed.fetch_add(1, Ordering::SeqCst);
        self.settle();
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready_tx.borrow()
    }

    pub fn failed_count(&self) -> usize {
        self.inner.failed.load(Ordering::SeqCst)
    }

    /// Wait until the gate turns ready.
    pub async fn wait(&self) {
        let mut rx = self.inner.ready_tx.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    fn settle(&self) {
        let previous = self
            .inner
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        match previous {
            Ok(1) => self.fire(),
            Ok(_) => {}
            Err(_) => tracing::debug!("ready gate settled more times than expected"),
        }
    }

    fn fire(&self) {
        if self.inner.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.ready_tx.send_replace(true);
        self.inner.events.emit(HostEvent::Ready);
        tracing::debug!(failed = self.failed_count(), "page ready");
    }
}
