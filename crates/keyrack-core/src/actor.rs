//! Caller identity.

use keyrack_storage::{Role, UserId};

/// Resolved caller attached to every operation by the authentication layer.
///
/// The boundary refuses service for inactive users before a request reaches
/// the core; `is_active` is carried for completeness, not re-checked here.
#[derive(Clone, Debug)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
    pub is_active: bool,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
