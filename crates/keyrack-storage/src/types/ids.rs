//! Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).

use uuid::Uuid;

/// User identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

/// Credential group identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(pub Uuid);

/// Credential identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CredentialId(pub Uuid);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_debug() {
        let uuid = Uuid::new_v4();
        let user_id = UserId(uuid);
        assert!(format!("{:?}", user_id).contains(&uuid.to_string()));
    }

    #[test]
    fn test_typed_ids_equality() {
        let uuid = Uuid::new_v4();
        assert_eq!(GroupId(uuid), GroupId(uuid));

        let other = Uuid::new_v4();
        assert_ne!(GroupId(uuid), GroupId(other));
    }

    #[test]
    fn test_typed_ids_inner_access() {
        let uuid = Uuid::new_v4();
        assert_eq!(UserId(uuid).0, uuid);
        assert_eq!(GroupId(uuid).0, uuid);
        assert_eq!(CredentialId(uuid).0, uuid);
    }

    #[test]
    fn test_typed_ids_hash() {
        use std::collections::HashSet;

        let uuid = Uuid::new_v4();
        let mut set = HashSet::new();
        set.insert(CredentialId(uuid));
        assert!(set.contains(&CredentialId(uuid)));
    }
}
