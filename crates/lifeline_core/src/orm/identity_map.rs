//! Explicit identity map keyed by `(EntityKind, id)`.
//!
//! # Invariants
//! - One entry per stored entity; the entry holds the last materialized or
//!   flushed snapshot.
//! - `clear` detaches every entry.

use crate::event::EntityRef;
use crate::mapping::EntityKind;
use crate::model::user::{Child, ChildId, User, UserId};
use std::collections::HashMap;

/// Identity of one stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }

    pub fn user(id: UserId) -> Self {
        Self::new(EntityKind::User, id.0)
    }

    pub fn child(id: ChildId) -> Self {
        Self::new(EntityKind::Child, id.0)
    }

    fn of(entity: EntityRef<'_>) -> Option<Self> {
        entity
            .raw_id()
            .map(|id| Self::new(entity.kind(), id))
    }
}

/// Per-instance lifecycle position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not tracked: never flushed, or detached by `clear`.
    Unmanaged,
    /// Written by `flush`, not yet materialized from the store.
    Persisted,
    /// Materialized by a load or refresh at least once.
    Loaded,
}

#[derive(Debug, Clone)]
enum Snapshot {
    User(User),
    Child(Child),
}

#[derive(Debug, Clone)]
struct ManagedEntry {
    state: LifecycleState,
    loads: u32,
    snapshot: Snapshot,
}

#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: HashMap<EntityKey, ManagedEntry>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a freshly flushed entity. Entities without id are ignored.
    pub fn record_persisted(&mut self, entity: EntityRef<'_>) {
        let Some(key) = EntityKey::of(entity) else {
            return;
        };
        self.entries.insert(
            key,
            ManagedEntry {
                state: LifecycleState::Persisted,
                loads: 0,
                snapshot: snapshot_of(entity),
            },
        );
    }

    /// Tracks one materialization of `entity`, replacing its snapshot.
    pub fn record_loaded(&mut self, entity: EntityRef<'_>) {
        let Some(key) = EntityKey::of(entity) else {
            return;
        };
        let snapshot = snapshot_of(entity);
        let entry = self.entries.entry(key).or_insert(ManagedEntry {
            state: LifecycleState::Loaded,
            loads: 0,
            snapshot: snapshot.clone(),
        });
        entry.state = LifecycleState::Loaded;
        entry.loads += 1;
        entry.snapshot = snapshot;
    }

    /// Detaches one entity. Returns whether it was tracked.
    pub fn remove(&mut self, key: EntityKey) -> bool {
        self.entries.remove(&key).is_some()
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        match self.entries.get(&EntityKey::user(id)).map(|entry| &entry.snapshot) {
            Some(Snapshot::User(user)) => Some(user),
            _ => None,
        }
    }

    pub fn child(&self, id: ChildId) -> Option<&Child> {
        match self.entries.get(&EntityKey::child(id)).map(|entry| &entry.snapshot) {
            Some(Snapshot::Child(child)) => Some(child),
            _ => None,
        }
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn state(&self, key: EntityKey) -> LifecycleState {
        self.entries
            .get(&key)
            .map_or(LifecycleState::Unmanaged, |entry| entry.state)
    }

    /// Number of materializations recorded since the entity became managed.
    pub fn load_count(&self, key: EntityKey) -> u32 {
        self.entries.get(&key).map_or(0, |entry| entry.loads)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn snapshot_of(entity: EntityRef<'_>) -> Snapshot {
    match entity {
        EntityRef::User(user) => Snapshot::User(user.clone()),
        EntityRef::Child(child) => Snapshot::Child(child.clone()),
    }
}
