//! Group types: named collections of credentials and access-control boundaries.

use chrono::{DateTime, Utc};

use super::{GrantCapabilities, GroupId};

/// Display color assigned to groups created without one.
pub const DEFAULT_GROUP_COLOR: &str = "#FFD700";

/// Group record
#[derive(Clone, Debug)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Group row as returned by listings: the record plus the number of active
/// credentials it holds and, for non-admin callers, the caller's own grant.
#[derive(Clone, Debug)]
pub struct GroupSummary {
    pub group: Group,
    pub credential_count: i64,
    pub own_grant: Option<GrantCapabilities>,
}

/// Parameters for creating a group
#[derive(Clone, Debug)]
pub struct CreateGroupParams {
    pub name: String,
    pub description: Option<String>,
    /// Falls back to [`DEFAULT_GROUP_COLOR`] when `None`.
    pub color: Option<String>,
}

/// Parameters for updating a group
#[derive(Clone, Debug)]
pub struct UpdateGroupParams {
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub is_active: bool,
}

/// Aggregate group counts for the admin overview.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}
