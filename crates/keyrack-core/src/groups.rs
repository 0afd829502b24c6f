//! Group registry: group metadata CRUD and permission grant management.
//!
//! Group and grant administration is admin-only. Unlike credentials, group
//! existence is not secret: a known group the actor may not act on yields
//! `Forbidden`, not `NotFound`.

use std::sync::Arc;

use keyrack_storage::{
    Capability, CreateGroupParams, GrantCapabilities, Group, GroupId, GroupMember, GroupStats,
    GroupSummary, PermissionGrant, Store, StoreError, UpdateGroupParams, UserId,
};

use crate::{access, Actor, VaultError};

/// A group with its members. Members are listed for admins only; other
/// callers get an empty list.
#[derive(Clone, Debug)]
pub struct GroupDetail {
    pub group: Group,
    pub members: Vec<GroupMember>,
}

pub struct GroupRegistry {
    store: Arc<dyn Store>,
}

impl GroupRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// List groups: all active groups for admins, granted groups (with the
    /// caller's own triple) for everyone else.
    pub async fn list(&self, actor: &Actor) -> Result<Vec<GroupSummary>, VaultError> {
        if actor.is_admin() {
            Ok(self.store.list_groups().await?)
        } else {
            Ok(self.store.list_groups_for_user(&actor.id).await?)
        }
    }

    /// Fetch a group. Non-admins need a view grant; admins also get the
    /// member list.
    pub async fn get(&self, group_id: &GroupId, actor: &Actor) -> Result<GroupDetail, VaultError> {
        let group = self.store.get_group(group_id).await?;

        if !actor.is_admin() {
            if !access::check(self.store.as_ref(), actor, group_id, Capability::View).await? {
                return Err(VaultError::Forbidden);
            }
            return Ok(GroupDetail {
                group,
                members: Vec::new(),
            });
        }

        let members = self.store.list_group_members(group_id).await?;
        Ok(GroupDetail { group, members })
    }

    /// Create a group. Name must not collide with a currently-active group;
    /// names of deactivated groups are free for reuse.
    pub async fn create(
        &self,
        params: CreateGroupParams,
        actor: &Actor,
    ) -> Result<Group, VaultError> {
        self.require_admin(actor)?;

        let name = params.name.trim().to_string();
        match self.store.get_group_by_name(&name).await {
            Ok(_) => return Err(VaultError::DuplicateGroupName(name)),
            Err(StoreError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }

        let params = CreateGroupParams { name, ..params };
        self.store
            .create_group(&params)
            .await
            .map_err(|err| match err {
                StoreError::AlreadyExists => VaultError::DuplicateGroupName(params.name.clone()),
                other => other.into(),
            })
    }

    /// Update a group's fields. Renames collide only against active names.
    pub async fn update(
        &self,
        group_id: &GroupId,
        params: UpdateGroupParams,
        actor: &Actor,
    ) -> Result<Group, VaultError> {
        self.require_admin(actor)?;
        self.store.get_group(group_id).await?;

        let name = params.name.trim().to_string();
        match self.store.get_group_by_name(&name).await {
            Ok(existing) if existing.id != *group_id => {
                return Err(VaultError::DuplicateGroupName(name))
            }
            Ok(_) | Err(StoreError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }

        let params = UpdateGroupParams { name, ..params };
        self.store
            .update_group(group_id, &params)
            .await
            .map_err(|err| match err {
                StoreError::AlreadyExists => VaultError::DuplicateGroupName(params.name.clone()),
                other => other.into(),
            })
    }

    /// Soft-delete a group. Member credentials keep their rows and history;
    /// the group's name becomes reusable.
    pub async fn deactivate(&self, group_id: &GroupId, actor: &Actor) -> Result<Group, VaultError> {
        self.require_admin(actor)?;
        self.store.get_group(group_id).await?;
        Ok(self.store.deactivate_group(group_id).await?)
    }

    /// Grant a user capabilities on a group, overwriting any existing grant
    /// for the pair.
    pub async fn grant(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        caps: GrantCapabilities,
        actor: &Actor,
    ) -> Result<PermissionGrant, VaultError> {
        self.require_admin(actor)?;
        self.store.get_group(group_id).await?;
        self.store.get_user(user_id).await?;
        Ok(self.store.upsert_grant(group_id, user_id, &caps).await?)
    }

    /// Revoke a user's grant on a group. Returns whether a grant existed, so
    /// callers can distinguish "removed" from "was never a member".
    pub async fn revoke(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        actor: &Actor,
    ) -> Result<bool, VaultError> {
        self.require_admin(actor)?;
        self.store.get_group(group_id).await?;
        self.store.get_user(user_id).await?;
        Ok(self.store.delete_grant(group_id, user_id).await?)
    }

    /// Users holding a grant on the group, with their triples.
    pub async fn members(
        &self,
        group_id: &GroupId,
        actor: &Actor,
    ) -> Result<Vec<GroupMember>, VaultError> {
        self.require_admin(actor)?;
        self.store.get_group(group_id).await?;
        Ok(self.store.list_group_members(group_id).await?)
    }

    /// Aggregate counts for the admin overview.
    pub async fn stats(&self, actor: &Actor) -> Result<GroupStats, VaultError> {
        self.require_admin(actor)?;
        Ok(self.store.group_stats().await?)
    }

    fn require_admin(&self, actor: &Actor) -> Result<(), VaultError> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(VaultError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keyrack_storage::{MockStore, Role};
    use uuid::Uuid;

    fn admin_actor() -> Actor {
        Actor {
            id: UserId(Uuid::new_v4()),
            role: Role::Admin,
            is_active: true,
        }
    }

    fn user_actor() -> Actor {
        Actor {
            id: UserId(Uuid::new_v4()),
            role: Role::User,
            is_active: true,
        }
    }

    fn group(name: &str) -> Group {
        Group {
            id: GroupId(Uuid::new_v4()),
            name: name.into(),
            description: None,
            color: "#FFD700".into(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_is_admin_only() {
        let registry = GroupRegistry::new(Arc::new(MockStore::new()));
        let err = registry
            .create(
                CreateGroupParams {
                    name: "Finance".into(),
                    description: None,
                    color: None,
                },
                &user_actor(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Forbidden));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_active_name() {
        let mut store = MockStore::new();
        store
            .expect_get_group_by_name()
            .returning(|name| Ok(group(name)));

        let registry = GroupRegistry::new(Arc::new(store));
        let err = registry
            .create(
                CreateGroupParams {
                    name: "Finance".into(),
                    description: None,
                    color: None,
                },
                &admin_actor(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::DuplicateGroupName(name) if name == "Finance"));
    }

    #[tokio::test]
    async fn rename_to_own_name_is_allowed() {
        let existing = group("Finance");
        let group_id = existing.id.clone();

        let mut store = MockStore::new();
        {
            let existing = existing.clone();
            store
                .expect_get_group()
                .returning(move |_| Ok(existing.clone()));
        }
        {
            let existing = existing.clone();
            store
                .expect_get_group_by_name()
                .returning(move |_| Ok(existing.clone()));
        }
        {
            let existing = existing.clone();
            store
                .expect_update_group()
                .returning(move |_, _| Ok(existing.clone()));
        }

        let registry = GroupRegistry::new(Arc::new(store));
        let result = registry
            .update(
                &group_id,
                UpdateGroupParams {
                    name: "Finance".into(),
                    description: Some("books".into()),
                    color: "#FFD700".into(),
                    is_active: true,
                },
                &admin_actor(),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn grant_requires_existing_user() {
        let mut store = MockStore::new();
        store.expect_get_group().returning(|_| Ok(group("Finance")));
        store
            .expect_get_user()
            .returning(|_| Err(StoreError::NotFound));

        let registry = GroupRegistry::new(Arc::new(store));
        let err = registry
            .grant(
                &GroupId(Uuid::new_v4()),
                &UserId(Uuid::new_v4()),
                GrantCapabilities::default(),
                &admin_actor(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::NotFound));
    }

    #[tokio::test]
    async fn members_are_admin_only() {
        let registry = GroupRegistry::new(Arc::new(MockStore::new()));
        let err = registry
            .members(&GroupId(Uuid::new_v4()), &user_actor())
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Forbidden));
    }
}
