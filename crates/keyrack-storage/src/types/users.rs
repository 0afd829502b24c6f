//! User types.
//!
//! User lifecycle (registration, password handling, activation) belongs to the
//! authentication layer; the store only resolves users as actors and foreign keys.

use chrono::{DateTime, Utc};

use super::{Role, UserId};

/// User record
#[derive(Clone, Debug)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a user
#[derive(Clone, Debug)]
pub struct CreateUserParams {
    pub email: String,
    pub name: String,
    pub role: Role,
}
