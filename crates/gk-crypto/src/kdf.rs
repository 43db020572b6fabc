//! Snapshot key derivation.
//!
//! The operator configures a free-form secret string. It is stretched into a
//! 256-bit AEAD key with HKDF-SHA256 (RFC 5869) under fixed, versioned salt and
//! info labels so that a future snapshot format can derive an unrelated key
//! from the same secret.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::aead::{AEAD_KEY_SIZE, AeadKey};
use crate::error::{CryptoError, CryptoResult};

/// HKDF salt for snapshot keys.
pub const SNAPSHOT_KEY_SALT: &[u8] = b"gatekeeper.snapshot.salt.v1";

/// HKDF info label for snapshot keys.
pub const SNAPSHOT_KEY_INFO: &[u8] = b"gatekeeper.snapshot.key.v1";

/// Key used to seal snapshot records, derived from the operator secret.
///
/// Zeroized on drop through the wrapped [`AeadKey`].
#[derive(Clone)]
pub struct SnapshotKey {
    key: AeadKey,
}

impl SnapshotKey {
    /// Derive the snapshot key from a secret string.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EmptySecret`] if `secret` is empty, or
    /// [`CryptoError::KeyDerivationFailed`] if HKDF expansion fails.
    pub fn from_secret(secret: &str) -> CryptoResult<Self> {
        if secret.is_empty() {
            return Err(CryptoError::EmptySecret);
        }

        let hkdf = Hkdf::<Sha256>::new(Some(SNAPSHOT_KEY_SALT), secret.as_bytes());
        let mut bytes = [0u8; AEAD_KEY_SIZE];
        hkdf.expand(SNAPSHOT_KEY_INFO, &mut bytes)
            .map_err(|_| CryptoError::KeyDerivationFailed("HKDF expand failed".into()))?;

        Ok(Self {
            key: AeadKey::from_bytes(bytes),
        })
    }

    /// Get the underlying AEAD key.
    #[must_use]
    pub const fn aead_key(&self) -> &AeadKey {
        &self.key
    }
}

impl std::fmt::Debug for SnapshotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotKey").finish_non_exhaustive()
    }
}
