//! Lifecycle event registry.
//!
//! # Responsibility
//! - Map each `LifecycleEvent` to an ordered set of listeners.
//! - Dispatch notifications synchronously, in registration order.
//!
//! # Invariants
//! - A listener appears at most once per event kind.
//! - The first listener error aborts the dispatch and is returned unchanged.

mod counter;
mod manager;

pub use counter::PostLoadCounter;
pub use manager::{
    EntityRef, EventManager, LifecycleEvent, LifecycleEventArgs, LifecycleListener, ListenerError,
};
