//! Permission resolution.
//!
//! Every access decision in the workspace reduces to [`is_allowed`]:
//! admin role bypasses grants for any capability on any group (active or
//! not); otherwise the grant for the (user, group) pair decides, and absence
//! of a grant denies. Pure lookup, no side effects.

use keyrack_storage::{Capability, GroupId, PermissionGrant, Role, Store, StoreError};

use crate::Actor;

/// Decide whether a role plus an optional grant carries a capability.
pub fn is_allowed(role: Role, grant: Option<&PermissionGrant>, capability: Capability) -> bool {
    if role == Role::Admin {
        return true;
    }
    grant.map(|g| g.allows(capability)).unwrap_or(false)
}

/// Fetch the actor's grant on a group and resolve the capability.
///
/// A missing group or user shows up as a missing grant and therefore a
/// denial, not an error; the caller's own existence checks decide what
/// becomes a not-found outcome.
pub async fn check(
    store: &dyn Store,
    actor: &Actor,
    group_id: &GroupId,
    capability: Capability,
) -> Result<bool, StoreError> {
    if actor.is_admin() {
        return Ok(true);
    }
    let grant = store.get_grant(group_id, &actor.id).await?;
    let allowed = is_allowed(actor.role, grant.as_ref(), capability);
    if !allowed {
        tracing::debug!(
            user = %actor.id.0,
            group = %group_id.0,
            capability = capability.as_str(),
            "permission denied"
        );
    }
    Ok(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keyrack_storage::UserId;
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
    fn absent_grant_denies_every_capability() {
        for capability in [Capability::View, Capability::Edit, Capability::Delete] {
            assert!(!is_allowed(Role::User, None, capability));
        }
    }

    #[test]
    fn admin_bypasses_grants_entirely() {
        for capability in [Capability::View, Capability::Edit, Capability::Delete] {
            assert!(is_allowed(Role::Admin, None, capability));
        }
        // even an all-false grant does not restrict an admin
        let g = grant(false, false, false);
        assert!(is_allowed(Role::Admin, Some(&g), Capability::Delete));
    }

    #[test]
    fn view_only_grant_permits_view_alone() {
        let g = grant(true, false, false);
        assert!(is_allowed(Role::User, Some(&g), Capability::View));
        assert!(!is_allowed(Role::User, Some(&g), Capability::Edit));
        assert!(!is_allowed(Role::User, Some(&g), Capability::Delete));
    }

    #[test]
    fn capabilities_are_independent() {
        // delete without view: delete allowed, view denied
        let g = grant(false, false, true);
        assert!(!is_allowed(Role::User, Some(&g), Capability::View));
        assert!(is_allowed(Role::User, Some(&g), Capability::Delete));
    }
}
