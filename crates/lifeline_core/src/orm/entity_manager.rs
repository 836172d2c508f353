//! Entity manager use-case API.
//!
//! # Responsibility
//! - Queue new graphs and write them on `flush`.
//! - Materialize users with eagerly populated children on `find_all`/`find`.
//! - Re-read managed users (and, with cascade refresh, their children) on
//!   `refresh`.
//!
//! # Invariants
//! - `PostLoad` fires after the whole graph of one user is populated:
//!   parent first, then children in collection order.
//! - A listener error aborts the operation. A failed load evicts the graph
//!   it was materializing, so the next load materializes and notifies it
//!   again.
//! - Cascade refresh evicts children whose rows are gone.

use super::config::EntityManagerConfig;
use super::identity_map::{EntityKey, IdentityMap, LifecycleState};
use super::unit_of_work::UnitOfWork;
use super::{OrmError, OrmResult};
use crate::event::{EntityRef, EventManager, LifecycleEvent, LifecycleListener, ListenerError};
use crate::mapping::EntityKind;
use crate::model::user::{Child, ChildId, User, UserId};
use crate::repo::entity_repo::{EntityRepository, RepoError};
use log::{debug, info};
use std::sync::Arc;
use std::time::Instant;

/// Entities written by one `flush`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Flushed users with ids assigned, collections included.
    pub users: Vec<User>,
    /// Standalone children queued through `persist_child`.
    pub children: Vec<Child>,
}

/// Unit of work plus identity map over one repository.
pub struct EntityManager<R: EntityRepository> {
    repo: R,
    config: EntityManagerConfig,
    events: EventManager,
    identity_map: IdentityMap,
    unit_of_work: UnitOfWork,
}

impl<R: EntityRepository> EntityManager<R> {
    /// Creates a manager using the default `User.children` mapping.
    pub fn new(repo: R) -> Self {
        Self::with_config(repo, EntityManagerConfig::default())
    }

    pub fn with_config(repo: R, config: EntityManagerConfig) -> Self {
        Self {
            repo,
            config,
            events: EventManager::new(),
            identity_map: IdentityMap::new(),
            unit_of_work: UnitOfWork::default(),
        }
    }

    pub fn config(&self) -> &EntityManagerConfig {
        &self.config
    }

    pub fn event_manager(&self) -> &EventManager {
        &self.events
    }

    pub fn event_manager_mut(&mut self) -> &mut EventManager {
        &mut self.events
    }

    /// Shorthand for `event_manager_mut().add_event_listener(..)`.
    pub fn add_event_listener(
        &mut self,
        events: &[LifecycleEvent],
        listener: Arc<dyn LifecycleListener>,
    ) {
        self.events.add_event_listener(events, listener);
    }

    /// Queues a new user graph for the next `flush`.
    ///
    /// # Contract
    /// - Dispatches `PrePersist` for the user, then for each cascaded child.
    /// - Nothing is written until `flush`.
    ///
    /// # Errors
    /// - `AlreadyPersisted` when the user or a child already has an id.
    /// - `Validation` when a child points at another user.
    /// - `UncascadedChildren` when the relationship does not cascade persist
    ///   and the user carries children.
    pub fn persist(&mut self, user: User) -> OrmResult<()> {
        if let Some(id) = user.id {
            return Err(OrmError::AlreadyPersisted {
                kind: EntityKind::User,
                id: id.0,
            });
        }
        if let Some(id) = user.children.iter().find_map(|child| child.id) {
            return Err(OrmError::AlreadyPersisted {
                kind: EntityKind::Child,
                id: id.0,
            });
        }
        user.validate()?;
        if !self.config.user_children.cascade.persist && !user.children.is_empty() {
            return Err(OrmError::UncascadedChildren {
                count: user.children.len(),
            });
        }

        self.events
            .dispatch(LifecycleEvent::PrePersist, EntityRef::User(&user))?;
        for child in &user.children {
            self.events
                .dispatch(LifecycleEvent::PrePersist, EntityRef::Child(child))?;
        }

        self.unit_of_work.schedule_user(user);
        Ok(())
    }

    /// Queues a standalone child whose back-reference names an existing user.
    pub fn persist_child(&mut self, child: Child) -> OrmResult<()> {
        if let Some(id) = child.id {
            return Err(OrmError::AlreadyPersisted {
                kind: EntityKind::Child,
                id: id.0,
            });
        }

        self.events
            .dispatch(LifecycleEvent::PrePersist, EntityRef::Child(&child))?;
        self.unit_of_work.schedule_child(child);
        Ok(())
    }

    /// Writes every pending entity in one transaction.
    ///
    /// # Contract
    /// - Written entities become `Persisted` in the identity map.
    /// - `PostPersist` fires after commit, so a failing listener leaves the
    ///   rows written.
    /// - A failed write discards the pending set.
    pub fn flush(&mut self) -> OrmResult<FlushOutcome> {
        if self.unit_of_work.is_empty() {
            return Ok(FlushOutcome::default());
        }

        let started_at = Instant::now();
        let (mut users, mut children) = self.unit_of_work.take();
        self.repo.write_pending(&mut users, &mut children)?;

        for user in &users {
            self.identity_map.record_persisted(EntityRef::User(user));
            for child in &user.children {
                self.identity_map.record_persisted(EntityRef::Child(child));
            }
        }
        for child in &children {
            self.identity_map.record_persisted(EntityRef::Child(child));
        }

        info!(
            "event=orm_flush module=orm status=ok users={} standalone_children={} duration_ms={}",
            users.len(),
            children.len(),
            started_at.elapsed().as_millis()
        );

        for user in &users {
            self.events
                .dispatch(LifecycleEvent::PostPersist, EntityRef::User(user))?;
            for child in &user.children {
                self.events
                    .dispatch(LifecycleEvent::PostPersist, EntityRef::Child(child))?;
            }
        }
        for child in &children {
            self.events
                .dispatch(LifecycleEvent::PostPersist, EntityRef::Child(child))?;
        }

        Ok(FlushOutcome { users, children })
    }

    /// Detaches every managed entity and drops the pending set.
    pub fn clear(&mut self) {
        let detached = self.identity_map.len();
        let dropped = self.unit_of_work.len();
        self.identity_map.clear();
        self.unit_of_work.clear();
        info!(
            "event=orm_clear module=orm status=ok detached={detached} dropped_pending={dropped}"
        );
    }

    /// Returns every user with its children eagerly populated.
    ///
    /// Managed users are served from the identity map without notification.
    pub fn find_all(&mut self) -> OrmResult<Vec<User>> {
        let rows = self.repo.load_users()?;
        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(self.materialize_user(row)?);
        }
        debug!(
            "event=orm_find_all module=orm status=ok users={}",
            users.len()
        );
        Ok(users)
    }

    /// Returns one user, from the identity map when managed.
    pub fn find(&mut self, id: UserId) -> OrmResult<Option<User>> {
        if let Some(user) = self.identity_map.user(id) {
            return Ok(Some(user.clone()));
        }
        match self.repo.load_user(id)? {
            Some(row) => Ok(Some(self.materialize_user(row)?)),
            None => Ok(None),
        }
    }

    /// Re-reads a managed user from the store into `user`.
    ///
    /// # Contract
    /// - With cascade refresh the collection is rebuilt from the child rows:
    ///   existing rows are re-populated, new rows appended, vanished rows
    ///   dropped (and detached), unflushed in-memory children discarded.
    /// - Without cascade refresh the collection is left as is.
    /// - One `PostLoad` per re-read instance, added to earlier counts.
    ///
    /// # Errors
    /// - `Unmanaged` when `user` has no id or is not in the identity map.
    /// - `NotFound` when the user row was deleted from the store.
    pub fn refresh(&mut self, user: &mut User) -> OrmResult<()> {
        let id = match user.id {
            Some(id) if self.identity_map.contains(EntityKey::user(id)) => id,
            other => {
                return Err(OrmError::Unmanaged {
                    kind: EntityKind::User,
                    id: other.map(|id| id.0),
                })
            }
        };

        let row = self.repo.load_user(id)?.ok_or(OrmError::NotFound {
            kind: EntityKind::User,
            id: id.0,
        })?;
        user.name = row.name;

        let cascade = self.config.user_children.cascade.refresh;
        if cascade {
            let rows = self.repo.load_children(id)?;
            let managed = self.identity_map.user(id).map(|snapshot| &snapshot.children);
            let stale: Vec<ChildId> = user
                .children
                .iter()
                .chain(managed.into_iter().flatten())
                .filter_map(|child| child.id)
                .filter(|child_id| !rows.iter().any(|row| row.id == Some(*child_id)))
                .collect();
            for child_id in stale {
                self.identity_map.remove(EntityKey::child(child_id));
            }
            user.children = rows;
        }

        self.identity_map.record_loaded(EntityRef::User(user));
        self.events
            .dispatch(LifecycleEvent::PostLoad, EntityRef::User(user))?;
        if cascade {
            for child in &user.children {
                self.identity_map.record_loaded(EntityRef::Child(child));
                self.events
                    .dispatch(LifecycleEvent::PostLoad, EntityRef::Child(child))?;
            }
        }

        debug!(
            "event=orm_refresh module=orm status=ok user_id={} cascade_refresh={} children={}",
            id,
            cascade,
            user.children.len()
        );
        Ok(())
    }

    pub fn contains(&self, kind: EntityKind, id: i64) -> bool {
        self.identity_map.contains(EntityKey::new(kind, id))
    }

    pub fn lifecycle_state(&self, kind: EntityKind, id: i64) -> LifecycleState {
        self.identity_map.state(EntityKey::new(kind, id))
    }

    /// Number of times the entity was materialized while managed.
    pub fn load_count(&self, kind: EntityKind, id: i64) -> u32 {
        self.identity_map.load_count(EntityKey::new(kind, id))
    }

    /// Number of root entities waiting for `flush`.
    pub fn pending_count(&self) -> usize {
        self.unit_of_work.len()
    }

    fn materialize_user(&mut self, mut row: User) -> OrmResult<User> {
        let id = row
            .id
            .ok_or_else(|| RepoError::InvalidData("user row without id".to_string()))?;
        if let Some(user) = self.identity_map.user(id) {
            return Ok(user.clone());
        }

        let mut fresh = Vec::new();
        for (position, child) in self.repo.load_children(id)?.into_iter().enumerate() {
            match child.id.and_then(|child_id| self.identity_map.child(child_id)) {
                Some(managed) => row.children.push(managed.clone()),
                None => {
                    fresh.push(position);
                    row.children.push(child);
                }
            }
        }

        self.identity_map.record_loaded(EntityRef::User(&row));
        for &position in &fresh {
            self.identity_map
                .record_loaded(EntityRef::Child(&row.children[position]));
        }

        if let Err(err) = self.notify_loaded(&row, &fresh) {
            self.identity_map.remove(EntityKey::user(id));
            for child_id in fresh.iter().filter_map(|&position| row.children[position].id) {
                self.identity_map.remove(EntityKey::child(child_id));
            }
            return Err(err.into());
        }

        Ok(row)
    }

    /// `PostLoad` for the parent, then for each freshly materialized child.
    fn notify_loaded(&self, user: &User, fresh: &[usize]) -> Result<(), ListenerError> {
        self.events
            .dispatch(LifecycleEvent::PostLoad, EntityRef::User(user))?;
        for &position in fresh {
            self.events
                .dispatch(LifecycleEvent::PostLoad, EntityRef::Child(&user.children[position]))?;
        }
        Ok(())
    }
}
