//! Entity manager: unit of work, identity map, load/refresh orchestration.
//!
//! # Responsibility
//! - Turn repository rows into managed entity graphs.
//! - Emit lifecycle notifications through the `EventManager`.
//!
//! # Invariants
//! - Exactly one `PostLoad` per instance materialized by an operation.
//! - Identity-map hits are returned without re-materialization.
//! - Notification counts accumulate; nothing resets them except the
//!   listener itself.

mod config;
mod entity_manager;
mod identity_map;
mod unit_of_work;

pub use config::EntityManagerConfig;
pub use entity_manager::{EntityManager, FlushOutcome};
pub use identity_map::{EntityKey, IdentityMap, LifecycleState};

use crate::event::ListenerError;
use crate::mapping::EntityKind;
use crate::model::user::ModelValidationError;
use crate::repo::entity_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type OrmResult<T> = Result<T, OrmError>;

/// Errors surfaced by entity manager operations.
#[derive(Debug)]
pub enum OrmError {
    Repo(RepoError),
    Validation(ModelValidationError),
    Listener(ListenerError),
    /// Managed entity row no longer exists in the store.
    NotFound { kind: EntityKind, id: i64 },
    /// Operation requires an entity tracked by the identity map.
    Unmanaged { kind: EntityKind, id: Option<i64> },
    /// `persist` was handed an entity that already has a store id.
    AlreadyPersisted { kind: EntityKind, id: i64 },
    /// New children reached through a relationship that does not cascade persist.
    UncascadedChildren { count: usize },
}

impl Display for OrmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Listener(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Unmanaged { kind, id: Some(id) } => {
                write!(f, "{kind} {id} is not managed by this entity manager")
            }
            Self::Unmanaged { kind, id: None } => {
                write!(f, "unflushed {kind} is not managed by this entity manager")
            }
            Self::AlreadyPersisted { kind, id } => {
                write!(f, "{kind} {id} is already persisted")
            }
            Self::UncascadedChildren { count } => write!(
                f,
                "{count} new children found through a relationship without cascade persist"
            ),
        }
    }
}

impl Error for OrmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Listener(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::Unmanaged { .. } => None,
            Self::AlreadyPersisted { .. } => None,
            Self::UncascadedChildren { .. } => None,
        }
    }
}

impl From<RepoError> for OrmError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ModelValidationError> for OrmError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ListenerError> for OrmError {
    fn from(value: ListenerError) -> Self {
        Self::Listener(value)
    }
}
