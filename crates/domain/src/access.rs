//! The authenticated caller, as handed over by the identity layer.

use common::UserId;

/// Who is making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Principal {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    /// Owners and admins may read a resource.
    pub fn can_read(&self, owner: UserId) -> bool {
        self.is_admin || self.user_id == owner
    }
}
