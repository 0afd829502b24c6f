//! Credential service: the CRUD+search surface, always mediated by
//! permission resolution, with every reveal audited and every mutation
//! paired with its audit row by the backend.

use std::sync::Arc;

use keyrack_audit::{AuditAction, AuditEntry, AuditEntryWithActor, AuditLog, RequestMeta};
use keyrack_crypto::{MasterKey, Nonce};
use keyrack_storage::{
    AccessibleCredential, Capability, CreateCredentialParams, Credential, CredentialFilter,
    CredentialId, CredentialListing, CredentialStats, GroupId, SecretRow, Store, StoreError,
    UpdateCredentialParams, UserId,
};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::{access, Actor, VaultError};

/// Default number of audit entries returned per credential.
const DEFAULT_LOG_LIMIT: u32 = 50;

/// A credential as submitted for creation. The secret arrives in plaintext
/// and is encrypted before it reaches storage.
#[derive(Clone, Debug)]
pub struct NewCredential {
    pub title: String,
    pub username: Option<String>,
    pub secret_value: String,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub group_id: GroupId,
}

/// A full replacement of a credential's fields. The secret value is always
/// re-supplied; a differing `group_id` moves the credential.
#[derive(Clone, Debug)]
pub struct CredentialUpdate {
    pub title: String,
    pub username: Option<String>,
    pub secret_value: String,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub group_id: GroupId,
}

pub struct CredentialService {
    store: Arc<dyn Store>,
    audit: Arc<dyn AuditLog>,
    key: MasterKey,
}

impl CredentialService {
    pub fn new(store: Arc<dyn Store>, audit: Arc<dyn AuditLog>, key: MasterKey) -> Self {
        Self { store, audit, key }
    }

    /// Create a credential in a group the actor can edit.
    ///
    /// The created record is returned without the secret value.
    pub async fn create(
        &self,
        input: NewCredential,
        actor: &Actor,
    ) -> Result<Credential, VaultError> {
        let group = match self.store.get_group(&input.group_id).await {
            Ok(group) => group,
            Err(StoreError::NotFound) => return Err(VaultError::InvalidGroup),
            Err(err) => return Err(err.into()),
        };

        if !access::check(self.store.as_ref(), actor, &group.id, Capability::Edit).await? {
            return Err(VaultError::Forbidden);
        }

        let id = CredentialId(Uuid::now_v7());
        let secret = self.encrypt_secret(&id, &input.secret_value)?;
        let params = CreateCredentialParams {
            id,
            title: input.title.trim().to_string(),
            username: clean(input.username),
            secret,
            url: clean(input.url),
            notes: clean(input.notes),
            group_id: input.group_id,
        };

        Ok(self.store.create_credential(&params, &actor.id).await?)
    }

    /// Fetch a credential the actor may view.
    ///
    /// For non-admins a missing record and a record in a group without a
    /// view grant are the same `NotFound`. The view audit entry is
    /// best-effort: a failure is logged and never fails the read.
    pub async fn get(
        &self,
        id: &CredentialId,
        actor: &Actor,
        meta: &RequestMeta,
    ) -> Result<Credential, VaultError> {
        let credential = self.store.get_credential(id, viewer(actor)).await?;
        self.record_view(id, actor, meta).await;
        Ok(credential)
    }

    /// Decrypt and return the secret value. Same gate as [`get`]; every call
    /// appends a view entry, with no deduplication across repeated reveals.
    ///
    /// [`get`]: CredentialService::get
    pub async fn reveal(
        &self,
        id: &CredentialId,
        actor: &Actor,
        meta: &RequestMeta,
    ) -> Result<Zeroizing<String>, VaultError> {
        self.store.get_credential(id, viewer(actor)).await?;

        let row = self.store.get_secret(id).await?;
        let nonce: [u8; 24] = row
            .nonce
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::Crypto)?;
        let plaintext =
            keyrack_crypto::decrypt(&row.ciphertext, &Nonce(nonce), &self.key, id.0.as_bytes())
                .map_err(|_| VaultError::Crypto)?;
        let value = String::from_utf8(plaintext.to_vec()).map_err(|_| VaultError::Crypto)?;

        self.record_view(id, actor, meta).await;
        Ok(Zeroizing::new(value))
    }

    /// List a group's active credentials, ordered by title.
    ///
    /// The group is looked up first, so a known-but-unviewable group is
    /// `Forbidden` rather than `NotFound` — group existence is not secret.
    pub async fn list_by_group(
        &self,
        group_id: &GroupId,
        actor: &Actor,
    ) -> Result<Vec<CredentialListing>, VaultError> {
        self.store.get_group(group_id).await?;

        if !access::check(self.store.as_ref(), actor, group_id, Capability::View).await? {
            return Err(VaultError::Forbidden);
        }

        Ok(self
            .store
            .list_credentials_by_group(group_id, viewer(actor))
            .await?)
    }

    /// Every active credential the actor can view, annotated with the
    /// actor's capability triple per group. Admins see everything.
    pub async fn list_accessible(
        &self,
        actor: &Actor,
    ) -> Result<Vec<AccessibleCredential>, VaultError> {
        if actor.is_admin() {
            let listings = self
                .store
                .search_credentials(&CredentialFilter::default(), None)
                .await?;
            return Ok(listings
                .into_iter()
                .map(|listing| AccessibleCredential {
                    listing,
                    can_view: true,
                    can_edit: true,
                    can_delete: true,
                })
                .collect());
        }
        Ok(self.store.list_credentials_for_user(&actor.id).await?)
    }

    /// Search active credentials, permission-scoped for non-admins.
    /// Results are ordered by group name, then title.
    pub async fn search(
        &self,
        filter: &CredentialFilter,
        actor: &Actor,
    ) -> Result<Vec<CredentialListing>, VaultError> {
        Ok(self.store.search_credentials(filter, viewer(actor)).await?)
    }

    /// Update a credential. Requires edit on the current group and, when the
    /// update moves the credential, edit on the destination group as well.
    /// A denial leaves no state change and no audit entry.
    pub async fn update(
        &self,
        id: &CredentialId,
        input: CredentialUpdate,
        actor: &Actor,
    ) -> Result<Credential, VaultError> {
        let existing = self.store.get_credential(id, viewer(actor)).await?;

        let destination = match self.store.get_group(&input.group_id).await {
            Ok(group) => group,
            Err(StoreError::NotFound) => return Err(VaultError::InvalidGroup),
            Err(err) => return Err(err.into()),
        };

        if !access::check(
            self.store.as_ref(),
            actor,
            &existing.group_id,
            Capability::Edit,
        )
        .await?
        {
            return Err(VaultError::Forbidden);
        }
        if destination.id != existing.group_id
            && !access::check(self.store.as_ref(), actor, &destination.id, Capability::Edit)
                .await?
        {
            return Err(VaultError::Forbidden);
        }

        let secret = self.encrypt_secret(id, &input.secret_value)?;
        let params = UpdateCredentialParams {
            title: input.title.trim().to_string(),
            username: clean(input.username),
            secret,
            url: clean(input.url),
            notes: clean(input.notes),
            group_id: input.group_id,
        };

        Ok(self.store.update_credential(id, &params, &actor.id).await?)
    }

    /// Retire a credential. Requires delete on its group. The record and its
    /// audit history remain queryable by admins; it never reappears in
    /// listings.
    pub async fn deactivate(
        &self,
        id: &CredentialId,
        actor: &Actor,
    ) -> Result<Credential, VaultError> {
        let existing = self.store.get_credential(id, viewer(actor)).await?;

        if !access::check(
            self.store.as_ref(),
            actor,
            &existing.group_id,
            Capability::Delete,
        )
        .await?
        {
            return Err(VaultError::Forbidden);
        }

        Ok(self.store.deactivate_credential(id, &actor.id).await?)
    }

    /// Audit history of a credential, newest first. Admin only; retired
    /// credentials stay reachable here.
    pub async fn logs(
        &self,
        id: &CredentialId,
        actor: &Actor,
        limit: Option<u32>,
    ) -> Result<Vec<AuditEntryWithActor>, VaultError> {
        if !actor.is_admin() {
            return Err(VaultError::Forbidden);
        }
        self.store.get_credential_any(id).await?;
        Ok(self
            .audit
            .for_credential(id, limit.unwrap_or(DEFAULT_LOG_LIMIT))
            .await?)
    }

    /// Aggregate counts for the admin overview.
    pub async fn stats(&self, actor: &Actor) -> Result<CredentialStats, VaultError> {
        if !actor.is_admin() {
            return Err(VaultError::Forbidden);
        }
        Ok(self.store.credential_stats().await?)
    }

    fn encrypt_secret(&self, id: &CredentialId, value: &str) -> Result<SecretRow, VaultError> {
        let (nonce, ciphertext) =
            keyrack_crypto::encrypt(value.as_bytes(), &self.key, id.0.as_bytes())
                .map_err(|_| VaultError::Crypto)?;
        Ok(SecretRow {
            nonce: nonce.0.to_vec(),
            ciphertext: ciphertext.0,
        })
    }

    async fn record_view(&self, id: &CredentialId, actor: &Actor, meta: &RequestMeta) {
        let entry = AuditEntry::builder(id, &actor.id, AuditAction::View)
            .request_meta(meta)
            .build();
        if let Err(err) = self.audit.record(entry).await {
            tracing::warn!(
                credential = %id.0,
                error = %err,
                "failed to record view audit entry"
            );
        }
    }
}

fn viewer(actor: &Actor) -> Option<UserId> {
    if actor.is_admin() {
        None
    } else {
        Some(actor.id.clone())
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keyrack_audit::MockAuditLog;
    use keyrack_storage::{MockStore, PermissionGrant, Role};

    fn user_actor() -> Actor {
        Actor {
            id: UserId(Uuid::new_v4()),
            role: Role::User,
            is_active: true,
        }
    }

    fn test_key() -> MasterKey {
        MasterKey::from_bytes(&[42u8; 32])
    }

    fn credential(id: &CredentialId, group_id: &GroupId) -> Credential {
        Credential {
            id: id.clone(),
            title: "Mail".into(),
            username: Some("alice".into()),
            url: None,
            notes: None,
            group_id: group_id.clone(),
            is_active: true,
            created_by: UserId(Uuid::new_v4()),
            last_modified_by: UserId(Uuid::new_v4()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            group_name: Some("Infra".into()),
            group_color: Some("#FFD700".into()),
            created_by_name: Some("Alice".into()),
            last_modified_by_name: Some("Alice".into()),
        }
    }

    fn group(id: &GroupId, name: &str) -> keyrack_storage::Group {
        keyrack_storage::Group {
            id: id.clone(),
            name: name.into(),
            description: None,
            color: "#FFD700".into(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn grant_for(actor: &Actor, group_id: &GroupId, edit: bool) -> PermissionGrant {
        PermissionGrant {
            group_id: group_id.clone(),
            user_id: actor.id.clone(),
            can_view: true,
            can_edit: edit,
            can_delete: false,
            granted_at: Utc::now(),
        }
    }

    fn service(store: MockStore, audit: MockAuditLog) -> CredentialService {
        CredentialService::new(Arc::new(store), Arc::new(audit), test_key())
    }

    #[tokio::test]
    async fn get_merges_denial_into_not_found() {
        let actor = user_actor();
        let id = CredentialId(Uuid::new_v4());

        let mut store = MockStore::new();
        // the gated query cannot tell "absent" from "no view grant"
        store
            .expect_get_credential()
            .returning(|_, _| Err(StoreError::NotFound));
        let audit = MockAuditLog::new();

        let svc = service(store, audit);
        let err = svc.get(&id, &actor, &RequestMeta::default()).await.unwrap_err();
        assert!(matches!(err, VaultError::NotFound));
    }

    #[tokio::test]
    async fn reveal_decrypts_and_records_view() {
        let actor = user_actor();
        let id = CredentialId(Uuid::new_v4());
        let group_id = GroupId(Uuid::new_v4());

        let row = {
            let (nonce, ct) =
                keyrack_crypto::encrypt(b"hunter2", &test_key(), id.0.as_bytes()).unwrap();
            SecretRow {
                nonce: nonce.0.to_vec(),
                ciphertext: ct.0,
            }
        };

        let mut store = MockStore::new();
        {
            let id = id.clone();
            let group_id = group_id.clone();
            store
                .expect_get_credential()
                .returning(move |_, _| Ok(credential(&id, &group_id)));
        }
        store.expect_get_secret().return_once(move |_| Ok(row));

        let mut audit = MockAuditLog::new();
        audit
            .expect_record()
            .times(1)
            .withf(|entry| entry.action == AuditAction::View)
            .returning(|_| Ok(()));

        let svc = service(store, audit);
        let value = svc
            .reveal(&id, &actor, &RequestMeta::default())
            .await
            .unwrap();
        assert_eq!(value.as_str(), "hunter2");
    }

    #[tokio::test]
    async fn failed_view_audit_does_not_fail_the_read() {
        let actor = user_actor();
        let id = CredentialId(Uuid::new_v4());
        let group_id = GroupId(Uuid::new_v4());

        let mut store = MockStore::new();
        {
            let id = id.clone();
            let group_id = group_id.clone();
            store
                .expect_get_credential()
                .returning(move |_, _| Ok(credential(&id, &group_id)));
        }

        let mut audit = MockAuditLog::new();
        audit
            .expect_record()
            .returning(|_| Err(keyrack_audit::AuditLogError::Database("down".into())));

        let svc = service(store, audit);
        assert!(svc.get(&id, &actor, &RequestMeta::default()).await.is_ok());
    }

    #[tokio::test]
    async fn moving_requires_edit_on_destination_too() {
        let actor = user_actor();
        let id = CredentialId(Uuid::new_v4());
        let source = GroupId(Uuid::new_v4());
        let destination = GroupId(Uuid::new_v4());

        let mut store = MockStore::new();
        {
            let id = id.clone();
            let source = source.clone();
            store
                .expect_get_credential()
                .returning(move |_, _| Ok(credential(&id, &source)));
        }
        store
            .expect_get_group()
            .returning(|group_id| Ok(group(group_id, "Destination")));
        {
            let actor_for_grants = actor.clone();
            let source = source.clone();
            store.expect_get_grant().returning(move |group_id, _| {
                if *group_id == source {
                    // edit on the source group only
                    Ok(Some(grant_for(&actor_for_grants, group_id, true)))
                } else {
                    Ok(None)
                }
            });
        }
        // no expectation for update_credential: reaching it would panic

        let svc = service(store, MockAuditLog::new());
        let update = CredentialUpdate {
            title: "Mail".into(),
            username: None,
            secret_value: "hunter2".into(),
            url: None,
            notes: None,
            group_id: destination,
        };
        let err = svc.update(&id, update, &actor).await.unwrap_err();
        assert!(matches!(err, VaultError::Forbidden));
    }

    #[tokio::test]
    async fn create_rejects_unknown_group() {
        let actor = user_actor();

        let mut store = MockStore::new();
        store
            .expect_get_group()
            .returning(|_| Err(StoreError::NotFound));

        let svc = service(store, MockAuditLog::new());
        let input = NewCredential {
            title: "Mail".into(),
            username: None,
            secret_value: "hunter2".into(),
            url: None,
            notes: None,
            group_id: GroupId(Uuid::new_v4()),
        };
        let err = svc.create(input, &actor).await.unwrap_err();
        assert!(matches!(err, VaultError::InvalidGroup));
    }

    #[tokio::test]
    async fn logs_are_admin_only() {
        let actor = user_actor();
        let id = CredentialId(Uuid::new_v4());

        let svc = service(MockStore::new(), MockAuditLog::new());
        let err = svc.logs(&id, &actor, None).await.unwrap_err();
        assert!(matches!(err, VaultError::Forbidden));
    }

    #[tokio::test]
    async fn stats_are_admin_only() {
        let actor = user_actor();

        let svc = service(MockStore::new(), MockAuditLog::new());
        let err = svc.stats(&actor).await.unwrap_err();
        assert!(matches!(err, VaultError::Forbidden));
    }
}
