//! Counting listener for `PostLoad` notifications.

use super::manager::{LifecycleEvent, LifecycleEventArgs, LifecycleListener, ListenerError};
use crate::mapping::EntityKind;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts `PostLoad` notifications per entity kind.
///
/// Other events are ignored. Counters only grow.
#[derive(Debug, Default)]
pub struct PostLoadCounter {
    users: AtomicU64,
    children: AtomicU64,
}

impl PostLoadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: EntityKind) -> u64 {
        self.slot(kind).load(Ordering::Relaxed)
    }

    pub fn child_calls(&self) -> u64 {
        self.count(EntityKind::Child)
    }

    pub fn user_calls(&self) -> u64 {
        self.count(EntityKind::User)
    }

    fn slot(&self, kind: EntityKind) -> &AtomicU64 {
        match kind {
            EntityKind::User => &self.users,
            EntityKind::Child => &self.children,
        }
    }
}

impl LifecycleListener for PostLoadCounter {
    fn handle(&self, args: &LifecycleEventArgs<'_>) -> Result<(), ListenerError> {
        if args.event != LifecycleEvent::PostLoad {
            return Ok(());
        }
        self.slot(args.entity.kind()).fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
