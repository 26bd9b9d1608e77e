//! Appliance state management for galley-sdk.
//!
//! Holds the canonical view of every appliance a client session knows
//! about: the per-device property cache with change detection, the
//! identifier-keyed registry, and the typed event bus that tells
//! application code what changed.
//!
//! # Consistency model
//!
//! A client processes inbound messages one at a time on a single
//! ingestion path, so cache mutation is serialized by construction no
//! matter which transport delivered an update; there is exactly one
//! canonical view of each device. The locks here only make concurrent
//! *reads* from application threads safe.

pub mod appliance;
pub mod events;
pub mod registry;

pub use appliance::{Appliance, ApplianceId, UpdateOutcome};
pub use events::{Event, EventBus, EventFilter, EventKind, EventStream};
pub use registry::Registry;
