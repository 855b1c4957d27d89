//! Page resource loading.
//!
//! A page declares references (stylesheets, scripts, icons). The [`Loader`]
//! serves each one from the persistent cache when it can, fetches it when it
//! cannot, and revalidates served content in the background.

pub mod engine;
pub mod events;
pub mod inflight;
pub mod materialize;
pub mod ready;
pub mod reference;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{LoadOutcome, LoadedReference, Loader, LoaderConfig, PageLoad, ReferenceState, Revalidation};
pub use events::{EventSink, HostEvent, ReloadLog};
pub use inflight::InFlight;
pub use materialize::{
    EphemeralHandle, HandleRegistry, Materializer, MaterializerConfig, RealizedResource, ReleasePolicy, Slot,
};
pub use ready::ReadyGate;
pub use reference::{NavigationType, ResourceReference, ResourceRole};
