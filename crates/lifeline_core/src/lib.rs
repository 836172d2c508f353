//! Core of lifeline: a small entity manager over SQLite that emits entity
//! lifecycle notifications (`PrePersist`, `PostPersist`, `PostLoad`).
//! This crate is the single source of truth for load/refresh semantics.

pub mod db;
pub mod event;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod orm;
pub mod repo;

pub use event::{
    EntityRef, EventManager, LifecycleEvent, LifecycleEventArgs, LifecycleListener,
    ListenerError, PostLoadCounter,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use mapping::{
    CascadeFlags, EntityKind, Multiplicity, RelationshipDescriptor, USER_CHILDREN,
};
pub use model::user::{Child, ChildId, ModelValidationError, User, UserId};
pub use orm::{
    EntityKey, EntityManager, EntityManagerConfig, FlushOutcome, LifecycleState, OrmError,
    OrmResult,
};
pub use repo::entity_repo::{EntityRepository, RepoError, RepoResult, SqliteEntityRepository};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
