//! `User` / `Child` entity graph.
//!
//! # Responsibility
//! - Hold the in-memory shape of one parent row and its child rows.
//! - Keep the child back-reference consistent with the owning collection.
//!
//! # Invariants
//! - `User::children` is ordered by child id once loaded from the store.
//! - `child.user == parent.id` for every child in `parent.children`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned identifier of a `User` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Store-assigned identifier of a `Child` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildId(pub i64);

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for ChildId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parent entity owning an ordered collection of children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// `None` until the user has been flushed.
    pub id: Option<UserId>,
    pub name: Option<String>,
    pub children: Vec<Child>,
}

/// Child entity with a non-owning back-reference to its user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    /// `None` until the child has been flushed.
    pub id: Option<ChildId>,
    /// Lookup key of the owning user, not ownership.
    pub user: Option<UserId>,
    pub content: Option<String>,
}

/// Violations of the parent/child back-reference invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    BackReferenceMismatch {
        child_index: usize,
        expected: Option<UserId>,
        found: Option<UserId>,
    },
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BackReferenceMismatch {
                child_index,
                expected,
                found,
            } => write!(
                f,
                "child #{child_index} points at user {} but belongs to user {}",
                display_user(*found),
                display_user(*expected)
            ),
        }
    }
}

impl Error for ModelValidationError {}

impl User {
    /// Creates an unmanaged user with an empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            children: Vec::new(),
        }
    }

    /// Appends a child and points its back-reference at this user.
    pub fn add_child(&mut self, mut child: Child) {
        child.user = self.id;
        self.children.push(child);
    }

    /// Checks that every child points back at this user.
    ///
    /// Unflushed users (`id == None`) must only hold children whose
    /// back-reference is also unset.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        for (child_index, child) in self.children.iter().enumerate() {
            if child.user != self.id {
                return Err(ModelValidationError::BackReferenceMismatch {
                    child_index,
                    expected: self.id,
                    found: child.user,
                });
            }
        }
        Ok(())
    }

    /// Finds a loaded child by id.
    pub fn child(&self, id: ChildId) -> Option<&Child> {
        self.children.iter().find(|child| child.id == Some(id))
    }
}

impl Child {
    /// Creates an unmanaged child without content.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unmanaged child holding `content`.
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            id: None,
            user: None,
            content: Some(content.into()),
        }
    }
}

fn display_user(id: Option<UserId>) -> String {
    id.map_or_else(|| "<unflushed>".to_string(), |id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::{Child, ModelValidationError, User, UserId};

    #[test]
    fn add_child_sets_back_reference() {
        let mut user = User::new("Gblanco");
        user.id = Some(UserId(7));
        user.add_child(Child::new());

        assert_eq!(user.children[0].user, Some(UserId(7)));
        assert!(user.validate().is_ok());
    }

    #[test]
    fn validate_rejects_foreign_child() {
        let mut user = User::new("Gblanco");
        let mut stray = Child::with_content("stray");
        stray.user = Some(UserId(3));
        user.children.push(stray);

        let err = user.validate().unwrap_err();
        assert_eq!(
            err,
            ModelValidationError::BackReferenceMismatch {
                child_index: 0,
                expected: None,
                found: Some(UserId(3)),
            }
        );
        assert!(err.to_string().contains("<unflushed>"));
    }
}
