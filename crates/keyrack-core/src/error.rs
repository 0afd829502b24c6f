//! Error taxonomy for vault operations.

use keyrack_audit::AuditLogError;
use keyrack_storage::StoreError;
use thiserror::Error;

/// Failure of a vault operation, surfaced with a stable machine-readable kind.
///
/// `NotFound` deliberately covers both "does not exist" and "exists but the
/// caller may not view it" on credential reads, so a denied caller learns
/// nothing about existence. `Forbidden` is used only where existence is
/// already disclosed (group management, admin-only surfaces).
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("a group named '{0}' already exists")]
    DuplicateGroupName(String),

    #[error("group does not resolve to an active group")]
    InvalidGroup,

    #[error("storage error: {0}")]
    Storage(StoreError),

    #[error("audit log error: {0}")]
    Audit(#[from] AuditLogError),

    #[error("secret value could not be processed")]
    Crypto,
}

impl VaultError {
    /// Stable machine-readable kind for callers that map errors onto a wire
    /// protocol.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::NotFound => "not_found",
            VaultError::Forbidden => "forbidden",
            VaultError::DuplicateGroupName(_) => "conflict",
            VaultError::InvalidGroup => "invalid_reference",
            VaultError::Storage(_) => "storage",
            VaultError::Audit(_) => "audit",
            VaultError::Crypto => "crypto",
        }
    }
}

impl From<StoreError> for VaultError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => VaultError::NotFound,
            other => VaultError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: VaultError = StoreError::NotFound.into();
        assert!(matches!(err, VaultError::NotFound));
    }

    #[test]
    fn store_backend_error_maps_to_storage() {
        let err: VaultError = StoreError::Backend("disk full".into()).into();
        assert!(matches!(err, VaultError::Storage(_)));
        assert_eq!(err.kind(), "storage");
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(VaultError::NotFound.kind(), "not_found");
        assert_eq!(VaultError::Forbidden.kind(), "forbidden");
        assert_eq!(
            VaultError::DuplicateGroupName("Finance".into()).kind(),
            "conflict"
        );
        assert_eq!(VaultError::InvalidGroup.kind(), "invalid_reference");
        assert_eq!(VaultError::Crypto.kind(), "crypto");
    }

    #[test]
    fn duplicate_group_name_mentions_the_name() {
        let err = VaultError::DuplicateGroupName("Finance".into());
        assert!(err.to_string().contains("Finance"));
    }
}
