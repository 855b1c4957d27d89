//! Materialization of envelopes into ephemeral handles bound to slots.
//!
//! A handle is a process-local URL (`blob:instapage/<uuid>`) that resolves to
//! realized content until it is released. Under [`ReleasePolicy::Delayed`]
//! release happens a fixed delay after creation, whether or not the slot is
//! done with it. Under [`ReleasePolicy::Scoped`] the handle lives exactly as
//! long as its binding.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::reference::ResourceRole;
use super::ready::ReadyGate;
use crate::cache::{Content, ContentEnvelope};

const HANDLE_PREFIX: &str = "blob:instapage/";

/// When handles are released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
    /// Fixed delay after creation.
    #[default]
    Delayed,
    /// When superseded by a newer binding or when the slot is dropped.
    Scoped,
}

/// Timing and release settings for a [`Materializer`].
#[derive(Debug, Clone)]
pub struct MaterializerConfig {
    pub release_policy: ReleasePolicy,
    pub release_delay: Duration,
    pub ready_delay: Duration,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            release_policy: ReleasePolicy::Delayed,
            release_delay: Duration::from_millis(1000),
            ready_delay: Duration::from_millis(1000),
        }
    }
}

/// Reference to realized content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EphemeralHandle(String);

impl EphemeralHandle {
    fn generate() -> Self {
        Self(format!("{HANDLE_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn url(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EphemeralHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content a live handle resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealizedResource {
    pub content: Content,
    pub media_type: String,
}

/// Table of live handles.
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    live: Arc<Mutex<HashMap<EphemeralHandle, Arc<RealizedResource>>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, envelope: &ContentEnvelope) -> EphemeralHandle {
        let handle = EphemeralHandle::generate();
        let realized = RealizedResource {
            content: envelope.content.clone(),
            media_type: envelope.media_type().to_string(),
        };
        self.lock().insert(handle.clone(), Arc::new(realized));
        handle
    }

    pub fn resolve(&self, handle: &EphemeralHandle) -> Option<Arc<RealizedResource>> {
        self.lock().get(handle).cloned()
    }

    /// Release a handle; returns false if it was already released.
    pub fn revoke(&self, handle: &EphemeralHandle) -> bool {
        self.lock().remove(handle).is_some()
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EphemeralHandle, Arc<RealizedResource>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Revokes a handle when dropped.
#[derive(Debug)]
struct ReleaseGuard {
    registry: HandleRegistry,
    handle: EphemeralHandle,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if self.registry.revoke(&self.handle) {
            tracing::debug!("released {} with its binding", self.handle);
        }
    }
}

#[derive(Debug)]
struct Binding {
    handle: EphemeralHandle,
    _guard: Option<ReleaseGuard>,
}

/// A consuming element: stylesheet link, script or icon.
#[derive(Debug)]
pub struct Slot {
    id: usize,
    role: ResourceRole,
    binding: Mutex<Option<Binding>>,
}

impl Slot {
    pub fn new(id: usize, role: ResourceRole) -> Self {
        Self { id, role, binding: Mutex::new(None) }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn role(&self) -> ResourceRole {
        self.role
    }

    /// Attribute the handle is assigned to.
    pub fn sink(&self) -> &'static str {
        self.role.sink()
    }

    /// Currently bound handle, if any.
    pub fn handle(&self) -> Option<EphemeralHandle> {
        self.lock().as_ref().map(|binding| binding.handle.clone())
    }

    pub fn is_bound(&self) -> bool {
        self.lock().is_some()
    }

    fn attach(&self, binding: Binding) {
        // The previous binding, and any scoped guard it holds, drops here.
        *self.lock() = Some(binding);
    }

    fn lock(&self) -> MutexGuard<'_, Option<Binding>> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Realizes envelopes and binds the resulting handles to slots.
#[derive(Debug, Clone, Default)]
pub struct Materializer {
    registry: HandleRegistry,
    config: MaterializerConfig,
}

impl Materializer {
    pub fn new(config: MaterializerConfig) -> Self {
        Self { registry: HandleRegistry::new(), config }
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MaterializerConfig {
        &self.config
    }

    /// Create a handle for the envelope.
    ///
    /// Under the delayed policy the release is scheduled here and not awaited.
    pub fn materialize(&self, envelope: &ContentEnvelope) -> EphemeralHandle {
        let handle = self.registry.create(envelope);

        if self.config.release_policy == ReleasePolicy::Delayed {
            let registry = self.registry.clone();
            let released = handle.clone();
            let delay = self.config.release_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if registry.revoke(&released) {
                    tracing::debug!("released {} after {:?}", released, delay);
                }
            });
        }

        handle
    }

    /// Attach a handle to the slot, then settle the slot in the gate after the
    /// ready delay.
    pub fn bind(&self, slot: &Slot, handle: EphemeralHandle, gate: &ReadyGate) {
        let guard = match self.config.release_policy {
            ReleasePolicy::Scoped => Some(ReleaseGuard { registry: self.registry.clone(), handle: handle.clone() }),
            ReleasePolicy::Delayed => None,
        };

        tracing::debug!("bound {} to slot {} ({})", handle, slot.id(), slot.sink());
        slot.attach(Binding { handle, _guard: guard });

        let gate = gate.clone();
        let delay = self.config.ready_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            gate.settle_bound();
        });
    }
}
