//! Permission grant types: the per-user, per-group capability triple.

use chrono::{DateTime, Utc};

use super::{GroupId, Role, UserId};

/// A single capability a grant can carry.
///
/// Closed enumeration: operations name the capability they require at the
/// type level, never as a free-form field name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    View,
    Edit,
    Delete,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::View => "view",
            Capability::Edit => "edit",
            Capability::Delete => "delete",
        }
    }
}

/// Permission grant for a (user, group) pair. At most one row per pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionGrant {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub granted_at: DateTime<Utc>,
}

impl PermissionGrant {
    /// Whether this grant carries the given capability.
    ///
    /// Each flag stands alone: `can_edit` does not imply `can_view`.
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::View => self.can_view,
            Capability::Edit => self.can_edit,
            Capability::Delete => self.can_delete,
        }
    }
}

/// Capability triple supplied when granting a user access to a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantCapabilities {
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl Default for GrantCapabilities {
    /// First-grant defaults: read access only.
    fn default() -> Self {
        Self {
            can_view: true,
            can_edit: false,
            can_delete: false,
        }
    }
}

/// A user holding a grant on a group, as listed for admins.
#[derive(Clone, Debug)]
pub struct GroupMember {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub granted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn grant(can_view: bool, can_edit: bool, can_delete: bool) -> PermissionGrant {
        PermissionGrant {
            group_id: GroupId(Uuid::new_v4()),
            user_id: UserId(Uuid::new_v4()),
            can_view,
            can_edit,
            can_delete,
            granted_at: Utc::now(),
        }
    }

    #[test]
    fn test_allows_maps_each_flag() {
        let g = grant(true, false, true);
        assert!(g.allows(Capability::View));
        assert!(!g.allows(Capability::Edit));
        assert!(g.allows(Capability::Delete));
    }

    #[test]
    fn test_no_capability_implied_by_another() {
        // edit alone does not grant view or delete
        let g = grant(false, true, false);
        assert!(!g.allows(Capability::View));
        assert!(g.allows(Capability::Edit));
        assert!(!g.allows(Capability::Delete));
    }

    #[test]
    fn test_default_grant_is_view_only() {
        let caps = GrantCapabilities::default();
        assert!(caps.can_view);
        assert!(!caps.can_edit);
        assert!(!caps.can_delete);
    }

    #[test]
    fn test_capability_as_str() {
        assert_eq!(Capability::View.as_str(), "view");
        assert_eq!(Capability::Edit.as_str(), "edit");
        assert_eq!(Capability::Delete.as_str(), "delete");
    }
}
