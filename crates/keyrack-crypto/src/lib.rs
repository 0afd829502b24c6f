//! Secret-value encryption for keyrack.
//!
//! Credential secrets are stored reversibly (reveal must return the raw
//! value): XChaCha20-Poly1305 under a vault master key derived from the
//! operator passphrase with Argon2id. The credential id is passed as AEAD
//! associated data so a ciphertext cannot be replayed onto another record.

use chacha20poly1305::{aead::Aead, KeyInit};
use rand_core::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct MasterKey(Zeroizing<[u8; 32]>);

impl MasterKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Wrap raw key bytes. Intended for tests and callers that manage their
    /// own derivation.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        MasterKey(Zeroizing::new(*bytes))
    }
}

#[derive(Debug, Error)]
pub enum KdfError {
    #[error("invalid kdf parameters")]
    InvalidParams(argon2::Error),
    #[error("key derivation failed")]
    DerivationFailed(argon2::Error),
}

const MIB: u32 = 1024;
const MEMORY_COST_KIB: u32 = 64 * MIB;

/// Derive the vault master key from the operator passphrase.
pub fn derive_master_key(pass: &str, salt: &[u8]) -> Result<MasterKey, KdfError> {
    let mut key = Zeroizing::new([0u8; 32]);

    let params =
        argon2::Params::new(MEMORY_COST_KIB, 3, 1, None).map_err(KdfError::InvalidParams)?;

    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    argon2
        .hash_password_into(pass.as_bytes(), salt, key.as_mut())
        .map_err(KdfError::DerivationFailed)?;

    Ok(MasterKey(key))
}

pub struct Nonce(pub [u8; 24]);
pub struct Ciphertext(pub Vec<u8>);

#[derive(Debug, Error)]
pub enum EncryptError {
    #[error("AEAD encryption failed")]
    AeadFailed(chacha20poly1305::aead::Error),
}

/// AEAD encrypt
pub fn encrypt(
    plaintext: &[u8],
    key: &MasterKey,
    aad: &[u8],
) -> Result<(Nonce, Ciphertext), EncryptError> {
    let key = chacha20poly1305::Key::from(*key.as_bytes());
    let cipher = chacha20poly1305::XChaCha20Poly1305::new(&key);

    let mut nonce_bytes = [0u8; 24];
    rand_core::OsRng.fill_bytes(&mut nonce_bytes);

    let nonce = chacha20poly1305::XNonce::from(nonce_bytes);
    let ct = cipher
        .encrypt(
            &nonce,
            chacha20poly1305::aead::Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(EncryptError::AeadFailed)?;

    Ok((Nonce(nonce_bytes), Ciphertext(ct)))
}

#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("AEAD decryption failed")]
    AeadFailed(chacha20poly1305::aead::Error),
}

/// AEAD decrypt
pub fn decrypt(
    ciphertext: &[u8],
    nonce: &Nonce,
    key: &MasterKey,
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    let key = chacha20poly1305::Key::from(*key.as_bytes());
    let cipher = chacha20poly1305::XChaCha20Poly1305::new(&key);

    let nonce = chacha20poly1305::XNonce::from(nonce.0);

    let pt = cipher
        .decrypt(
            &nonce,
            chacha20poly1305::aead::Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(DecryptError::AeadFailed)?;

    Ok(Zeroizing::new(pt))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> MasterKey {
        MasterKey::from_bytes(&[7u8; 32])
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key();
        let aad = b"credential-id";

        let (nonce, ct) = encrypt(b"hunter2", &key, aad).unwrap();
        let pt = decrypt(&ct.0, &nonce, &key, aad).unwrap();

        assert_eq!(pt.as_slice(), b"hunter2");
    }

    #[test]
    fn decrypt_rejects_wrong_aad() {
        let key = test_key();

        let (nonce, ct) = encrypt(b"hunter2", &key, b"credential-a").unwrap();
        let err = decrypt(&ct.0, &nonce, &key, b"credential-b");

        assert!(err.is_err());
    }

    #[test]
    fn decrypt_rejects_wrong_key() {
        let key = test_key();
        let other = MasterKey::from_bytes(&[8u8; 32]);
        let aad = b"credential-id";

        let (nonce, ct) = encrypt(b"hunter2", &key, aad).unwrap();
        let err = decrypt(&ct.0, &nonce, &other, aad);

        assert!(err.is_err());
    }

    #[test]
    fn nonces_are_unique_per_encryption() {
        let key = test_key();
        let aad = b"credential-id";

        let (n1, _) = encrypt(b"same", &key, aad).unwrap();
        let (n2, _) = encrypt(b"same", &key, aad).unwrap();

        assert_ne!(n1.0, n2.0);
    }

    #[test]
    fn derive_master_key_is_deterministic() {
        let salt = b"0123456789abcdef";
        let a = derive_master_key("passphrase", salt).unwrap();
        let b = derive_master_key("passphrase", salt).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());

        let c = derive_master_key("other", salt).unwrap();
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn derive_master_key_rejects_short_salt() {
        assert!(derive_master_key("passphrase", b"abc").is_err());
    }
}
