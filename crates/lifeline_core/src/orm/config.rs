use crate::mapping::{RelationshipDescriptor, USER_CHILDREN};

/// Mapping configuration consumed by the entity manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityManagerConfig {
    /// Relationship used to populate `User::children`.
    pub user_children: RelationshipDescriptor,
}

impl Default for EntityManagerConfig {
    fn default() -> Self {
        Self {
            user_children: USER_CHILDREN,
        }
    }
}
