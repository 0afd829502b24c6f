//! Audit logging abstraction for keyrack.
//!
//! This crate defines the `AuditLog` trait for persisting audit entries and
//! the types representing auditable actions on credentials. Entries are
//! append-only: no update or delete surface exists anywhere in the workspace.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyrack_storage::{CredentialId, GroupId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for an audit entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditEntryId(pub Uuid);

impl AuditEntryId {
    /// Generate a new audit entry ID using UUID v7 (time-ordered)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AuditEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AuditEntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The action an audit entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    View,
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::View => "view",
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(AuditAction::View),
            "create" => Ok(AuditAction::Create),
            "update" => Ok(AuditAction::Update),
            "delete" => Ok(AuditAction::Delete),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

/// Descriptive fields of a credential as captured in audit snapshots.
///
/// Deliberately excludes the secret value: snapshots carry only what is
/// needed to reconstruct who changed which metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSnapshot {
    pub title: String,
    pub username: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    /// Raw UUID for serialization compatibility.
    pub group_id: Uuid,
}

/// Requester context captured alongside view entries when available.
#[derive(Clone, Debug, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// One immutable record of an action on a credential.
///
/// Uses raw UUIDs for serialization compatibility. Use the builder to
/// construct entries from typed IDs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    /// Credential the action targeted (UUID)
    pub credential_id: Uuid,
    /// Actor that performed the action (UUID)
    pub user_id: Uuid,
    pub action: AuditAction,
    /// State before a mutation (update, delete)
    pub old_values: Option<CredentialSnapshot>,
    /// State after a mutation (create, update)
    pub new_values: Option<CredentialSnapshot>,
    /// Requester network address, if known
    pub ip_address: Option<String>,
    /// Requester agent string, if known
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Create a new audit entry builder
    pub fn builder(
        credential_id: &CredentialId,
        user_id: &UserId,
        action: AuditAction,
    ) -> AuditEntryBuilder {
        AuditEntryBuilder::new(credential_id, user_id, action)
    }

    /// Get the credential ID as a typed ID
    pub fn get_credential_id(&self) -> CredentialId {
        CredentialId(self.credential_id)
    }

    /// Get the actor ID as a typed ID
    pub fn get_user_id(&self) -> UserId {
        UserId(self.user_id)
    }
}

/// Builder for constructing audit entries
pub struct AuditEntryBuilder {
    credential_id: Uuid,
    user_id: Uuid,
    action: AuditAction,
    old_values: Option<CredentialSnapshot>,
    new_values: Option<CredentialSnapshot>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl AuditEntryBuilder {
    pub fn new(credential_id: &CredentialId, user_id: &UserId, action: AuditAction) -> Self {
        Self {
            credential_id: credential_id.0,
            user_id: user_id.0,
            action,
            old_values: None,
            new_values: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn old_values(mut self, snapshot: CredentialSnapshot) -> Self {
        self.old_values = Some(snapshot);
        self
    }

    pub fn new_values(mut self, snapshot: CredentialSnapshot) -> Self {
        self.new_values = Some(snapshot);
        self
    }

    pub fn request_meta(mut self, meta: &RequestMeta) -> Self {
        self.ip_address = meta.ip_address.clone();
        self.user_agent = meta.user_agent.clone();
        self
    }

    pub fn build(self) -> AuditEntry {
        AuditEntry {
            id: AuditEntryId::new(),
            credential_id: self.credential_id,
            user_id: self.user_id,
            action: self.action,
            old_values: self.old_values,
            new_values: self.new_values,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: Utc::now(),
        }
    }
}

/// Audit entry annotated with the actor's display fields for admin review.
#[derive(Clone, Debug)]
pub struct AuditEntryWithActor {
    pub entry: AuditEntry,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

/// Error type for audit log operations
#[derive(Debug, Error)]
pub enum AuditLogError {
    #[error("database error: {0}")]
    Database(String),

    #[error("audit entry not found: {0}")]
    NotFound(AuditEntryId),
}

/// Trait for audit log persistence.
///
/// `record` serves the read path (view entries): callers treat a failure as
/// best-effort — log it, never fail the read. Mutation-path entries are
/// written by the store backend inside the mutation transaction and do not
/// pass through this trait.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Insert one immutable entry.
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditLogError>;

    /// Entries for a credential, newest first, annotated with actor
    /// name/email. The log trusts its caller: admin gating happens upstream.
    async fn for_credential(
        &self,
        credential_id: &CredentialId,
        limit: u32,
    ) -> Result<Vec<AuditEntryWithActor>, AuditLogError>;
}

/// Build a snapshot from credential fields.
///
/// Takes the fields rather than a record so both the pre-image and the
/// incoming params sides of a mutation can produce one.
pub fn snapshot(
    title: &str,
    username: Option<&str>,
    url: Option<&str>,
    notes: Option<&str>,
    group_id: &GroupId,
) -> CredentialSnapshot {
    CredentialSnapshot {
        title: title.to_string(),
        username: username.map(str::to_string),
        url: url.map(str::to_string),
        notes: notes.map(str::to_string),
        group_id: group_id.0,
    }
}
