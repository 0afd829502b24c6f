//! The Store trait that backends implement.

use crate::types::*;
use crate::StoreError;

/// The storage trait the keyrack core depends on.
///
/// Mutating credential operations (`create_credential`, `update_credential`,
/// `deactivate_credential`) must write the data change and its audit row in
/// one atomic transaction: a reader observes either the full pre-state or the
/// full post-state plus its matching audit row, never a mismatched pair.
///
/// Read queries taking `viewer: Option<UserId>` apply the permission gate in
/// the query itself when a viewer is given (a row is visible only through a
/// grant with `can_view`); `None` is the ungated admin path.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    /// Create a user. Seed/test surface; user lifecycle is owned elsewhere.
    async fn create_user(&self, params: &CreateUserParams) -> Result<User, StoreError>;

    /// Get user by ID.
    async fn get_user(&self, user_id: &UserId) -> Result<User, StoreError>;

    // ───────────────────────────────────── Groups ─────────────────────────────────────────

    /// Create a group. Name must be unique among active groups.
    async fn create_group(&self, params: &CreateGroupParams) -> Result<Group, StoreError>;

    /// Get an active group by ID.
    async fn get_group(&self, group_id: &GroupId) -> Result<Group, StoreError>;

    /// Get an active group by name.
    async fn get_group_by_name(&self, name: &str) -> Result<Group, StoreError>;

    /// List all active groups with their active-credential counts.
    async fn list_groups(&self) -> Result<Vec<GroupSummary>, StoreError>;

    /// List active groups the user holds any grant on, with the user's triple.
    async fn list_groups_for_user(&self, user_id: &UserId)
        -> Result<Vec<GroupSummary>, StoreError>;

    /// Update a group's fields (including its active flag).
    async fn update_group(
        &self,
        group_id: &GroupId,
        params: &UpdateGroupParams,
    ) -> Result<Group, StoreError>;

    /// Soft-delete a group. Member credentials are left untouched.
    async fn deactivate_group(&self, group_id: &GroupId) -> Result<Group, StoreError>;

    /// Aggregate group counts.
    async fn group_stats(&self) -> Result<GroupStats, StoreError>;

    // ───────────────────────────────────── Grants ─────────────────────────────────────────

    /// Insert or overwrite the grant for a (group, user) pair.
    async fn upsert_grant(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        caps: &GrantCapabilities,
    ) -> Result<PermissionGrant, StoreError>;

    /// Delete the grant for a pair. Returns whether a row existed.
    async fn delete_grant(&self, group_id: &GroupId, user_id: &UserId)
        -> Result<bool, StoreError>;

    /// Fetch the grant for a pair, if any. Absence means no access.
    async fn get_grant(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Option<PermissionGrant>, StoreError>;

    /// List active users holding a grant on the group, ordered by name.
    async fn list_group_members(&self, group_id: &GroupId)
        -> Result<Vec<GroupMember>, StoreError>;

    // ─────────────────────────────────── Credentials ──────────────────────────────────────

    /// Insert a credential and its `create` audit row in one transaction.
    async fn create_credential(
        &self,
        params: &CreateCredentialParams,
        actor: &UserId,
    ) -> Result<Credential, StoreError>;

    /// Get an active credential by ID. With a viewer, the permission gate is
    /// part of the query and denial is indistinguishable from absence.
    async fn get_credential(
        &self,
        credential_id: &CredentialId,
        viewer: Option<UserId>,
    ) -> Result<Credential, StoreError>;

    /// Get a credential by ID regardless of its active flag. Admin audit
    /// surface; retired credentials stay reachable here.
    async fn get_credential_any(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Credential, StoreError>;

    /// Fetch the encrypted secret value of an active credential.
    async fn get_secret(&self, credential_id: &CredentialId) -> Result<SecretRow, StoreError>;

    /// List active credentials in a group, ordered by title.
    async fn list_credentials_by_group(
        &self,
        group_id: &GroupId,
        viewer: Option<UserId>,
    ) -> Result<Vec<CredentialListing>, StoreError>;

    /// List every active credential the user can view, with the user's
    /// capability triple per row. Ordered by group name, then title.
    async fn list_credentials_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AccessibleCredential>, StoreError>;

    /// Search active credentials. Ordered by group name, then title.
    async fn search_credentials(
        &self,
        filter: &CredentialFilter,
        viewer: Option<UserId>,
    ) -> Result<Vec<CredentialListing>, StoreError>;

    /// Apply an update and its `update` audit row (pre- and post-image
    /// snapshots) in one transaction. The pre-image is read inside the same
    /// transaction.
    async fn update_credential(
        &self,
        credential_id: &CredentialId,
        params: &UpdateCredentialParams,
        actor: &UserId,
    ) -> Result<Credential, StoreError>;

    /// Soft-delete a credential and write its `delete` audit row (pre-image
    /// snapshot) in one transaction.
    async fn deactivate_credential(
        &self,
        credential_id: &CredentialId,
        actor: &UserId,
    ) -> Result<Credential, StoreError>;

    /// Aggregate credential counts.
    async fn credential_stats(&self) -> Result<CredentialStats, StoreError>;
}
