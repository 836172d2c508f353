//! Static entity and relationship metadata.
//!
//! # Responsibility
//! - Name the entity kinds the manager knows about and their tables.
//! - Describe the `User -> Child` relationship, including cascade policy,
//!   as plain data consumed by the unit of work and refresh paths.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Entity kinds managed by the entity manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Child,
}

impl EntityKind {
    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Child => "children",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Child => "child",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    OneToMany,
    ManyToOne,
}

/// Operations that propagate from the owning side to related entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeFlags {
    pub persist: bool,
    pub refresh: bool,
}

impl CascadeFlags {
    pub const NONE: Self = Self {
        persist: false,
        refresh: false,
    };
}

/// Declarative relationship between two entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    pub owner: EntityKind,
    pub target: EntityKind,
    pub multiplicity: Multiplicity,
    /// Foreign key column on the target table.
    pub mapped_by: &'static str,
    pub cascade: CascadeFlags,
}

impl RelationshipDescriptor {
    /// Same relationship with a different cascade policy.
    pub const fn with_cascade(self, cascade: CascadeFlags) -> Self {
        Self { cascade, ..self }
    }
}

/// `User.children`: one-to-many, cascading persist and refresh.
pub const USER_CHILDREN: RelationshipDescriptor = RelationshipDescriptor {
    owner: EntityKind::User,
    target: EntityKind::Child,
    multiplicity: Multiplicity::OneToMany,
    mapped_by: "user_id",
    cascade: CascadeFlags {
        persist: true,
        refresh: true,
    },
};

#[cfg(test)]
mod tests {
    use super::{CascadeFlags, EntityKind, Multiplicity, USER_CHILDREN};

    #[test]
    fn user_children_cascades_persist_and_refresh() {
        assert_eq!(USER_CHILDREN.owner, EntityKind::User);
        assert_eq!(USER_CHILDREN.target, EntityKind::Child);
        assert_eq!(USER_CHILDREN.multiplicity, Multiplicity::OneToMany);
        assert!(USER_CHILDREN.cascade.persist);
        assert!(USER_CHILDREN.cascade.refresh);
    }

    #[test]
    fn with_cascade_only_changes_policy() {
        let plain = USER_CHILDREN.with_cascade(CascadeFlags::NONE);
        assert_eq!(plain.mapped_by, USER_CHILDREN.mapped_by);
        assert!(!plain.cascade.refresh);
    }

    #[test]
    fn kinds_map_to_tables() {
        assert_eq!(EntityKind::User.table(), "users");
        assert_eq!(EntityKind::Child.table(), "children");
    }
}
