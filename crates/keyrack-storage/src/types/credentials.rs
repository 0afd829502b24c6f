//! Credential types: secret entries and their listing projections.

use chrono::{DateTime, Utc};

use super::{CredentialId, GroupId, UserId};

/// Encrypted secret value (nonce + ciphertext); no plaintext in storage.
#[derive(Clone, Debug)]
pub struct SecretRow {
    pub nonce: Vec<u8>,      // 24 bytes (XChaCha20 nonce)
    pub ciphertext: Vec<u8>, // AEAD ciphertext
}

/// Credential record with joined display fields. The secret value is never
/// part of this record; it is fetched separately for reveal.
#[derive(Clone, Debug)]
pub struct Credential {
    pub id: CredentialId,
    pub title: String,
    pub username: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub group_id: GroupId,
    pub is_active: bool,
    pub created_by: UserId,
    pub last_modified_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub group_name: Option<String>,
    pub group_color: Option<String>,
    pub created_by_name: Option<String>,
    pub last_modified_by_name: Option<String>,
}

/// Non-secret projection of a credential for listings and search results.
#[derive(Clone, Debug)]
pub struct CredentialListing {
    pub id: CredentialId,
    pub title: String,
    pub username: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub group_id: GroupId,
    pub group_name: Option<String>,
    pub group_color: Option<String>,
    pub created_by_name: Option<String>,
    pub last_modified_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing row annotated with the viewer's own capability triple on the
/// credential's group.
#[derive(Clone, Debug)]
pub struct AccessibleCredential {
    pub listing: CredentialListing,
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

/// Parameters for creating a credential.
#[derive(Clone, Debug)]
pub struct CreateCredentialParams {
    /// Supplied by the caller so the ciphertext can be bound to the id as
    /// AEAD associated data before the row exists.
    pub id: CredentialId,
    pub title: String,
    pub username: Option<String>,
    pub secret: SecretRow,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub group_id: GroupId,
}

/// Parameters for updating a credential. The secret value is always
/// re-supplied and re-encrypted on update.
#[derive(Clone, Debug)]
pub struct UpdateCredentialParams {
    pub title: String,
    pub username: Option<String>,
    pub secret: SecretRow,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub group_id: GroupId,
}

/// Search filters. Both fields optional; an empty filter matches everything
/// the caller may see.
#[derive(Clone, Debug, Default)]
pub struct CredentialFilter {
    /// Case-insensitive term matched against title, username and url.
    pub search: Option<String>,
    pub group_id: Option<GroupId>,
}

/// Aggregate credential counts for the admin overview.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub groups_with_credentials: i64,
}
