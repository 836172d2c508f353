//! Pending-write set awaiting `flush`.

use crate::model::user::{Child, User};

#[derive(Debug, Default)]
pub(crate) struct UnitOfWork {
    users: Vec<User>,
    children: Vec<Child>,
}

impl UnitOfWork {
    pub(crate) fn schedule_user(&mut self, user: User) {
        self.users.push(user);
    }

    pub(crate) fn schedule_child(&mut self, child: Child) {
        self.children.push(child);
    }

    /// Hands over the pending set, leaving the unit of work empty.
    pub(crate) fn take(&mut self) -> (Vec<User>, Vec<Child>) {
        (
            std::mem::take(&mut self.users),
            std::mem::take(&mut self.children),
        )
    }

    /// Number of pending root entities.
    pub(crate) fn len(&self) -> usize {
        self.users.len() + self.children.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.users.is_empty() && self.children.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.users.clear();
        self.children.clear();
    }
}
