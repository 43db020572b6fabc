//! Record encryption using XChaCha20-Poly1305.
//!
//! Every snapshot record is sealed independently with a fresh random 192-bit
//! nonce, which is prepended to the ciphertext. The extended nonce keeps random
//! generation safe across many records and many runs under the same key.

use chacha20poly1305::{
    XChaCha20Poly1305,
    aead::{Aead, KeyInit, Payload},
};
use zeroize::ZeroizeOnDrop;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::SnapshotKey;

/// AEAD key size (256 bits).
pub const AEAD_KEY_SIZE: usize = 32;

/// XChaCha20-Poly1305 nonce size (192 bits / 24 bytes).
pub const XCHACHA20_NONCE_SIZE: usize = 24;

/// Poly1305 authentication tag size (128 bits / 16 bytes).
pub const AEAD_TAG_SIZE: usize = 16;

/// AEAD encryption key with zeroize semantics.
#[derive(Clone, ZeroizeOnDrop)]
pub struct AeadKey {
    bytes: [u8; AEAD_KEY_SIZE],
}

impl AeadKey {
    /// Create a new AEAD key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; AEAD_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Generate a random AEAD key.
    #[cfg(test)]
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; AEAD_KEY_SIZE];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
        Self { bytes }
    }

    /// Try to create from a slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly `AEAD_KEY_SIZE` bytes.
    #[cfg(test)]
    pub fn try_from_slice(slice: &[u8]) -> CryptoResult<Self> {
        if slice.len() != AEAD_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: AEAD_KEY_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; AEAD_KEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self { bytes })
    }

    /// Get the key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; AEAD_KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadKey").finish_non_exhaustive()
    }
}

/// XChaCha20-Poly1305 nonce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XChaCha20Nonce([u8; XCHACHA20_NONCE_SIZE]);

impl XChaCha20Nonce {
    /// Generate a random nonce.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; XCHACHA20_NONCE_SIZE];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
        Self(bytes)
    }

    /// Try to create from a slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly `XCHACHA20_NONCE_SIZE` bytes.
    pub fn try_from_slice(slice: &[u8]) -> CryptoResult<Self> {
        if slice.len() != XCHACHA20_NONCE_SIZE {
            return Err(CryptoError::InvalidNonceLength {
                expected: XCHACHA20_NONCE_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; XCHACHA20_NONCE_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get the nonce bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; XCHACHA20_NONCE_SIZE] {
        &self.0
    }
}

/// Seals and opens individual snapshot records.
///
/// Output layout of [`RecordCipher::seal`]: `nonce (24) || ciphertext || tag (16)`.
pub struct RecordCipher {
    cipher: XChaCha20Poly1305,
}

impl RecordCipher {
    /// Create a new cipher from a derived snapshot key.
    #[must_use]
    pub fn new(key: &SnapshotKey) -> Self {
        Self::from_aead_key(key.aead_key())
    }

    /// Create a new cipher from a raw AEAD key.
    #[must_use]
    pub fn from_aead_key(key: &AeadKey) -> Self {
        let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
        Self { cipher }
    }

    /// Encrypt with an explicit nonce.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails.
    pub fn encrypt(
        &self,
        nonce: &XChaCha20Nonce,
        plaintext: &[u8],
        aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let payload = Payload {
            msg: plaintext,
            aad,
        };
        self.cipher
            .encrypt(nonce.as_bytes().into(), payload)
            .map_err(|_| CryptoError::AeadEncryptFailed)
    }

    /// Decrypt with an explicit nonce.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails or the ciphertext is invalid.
    pub fn decrypt(
        &self,
        nonce: &XChaCha20Nonce,
        ciphertext: &[u8],
        aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let payload = Payload {
            msg: ciphertext,
            aad,
        };
        self.cipher
            .decrypt(nonce.as_bytes().into(), payload)
            .map_err(|_| CryptoError::AeadDecryptFailed)
    }

    /// Encrypt with a fresh random nonce, returning `nonce || ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        let nonce = XChaCha20Nonce::generate();
        let ciphertext = self.encrypt(&nonce, plaintext, aad)?;
        let mut sealed = Vec::with_capacity(XCHACHA20_NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(nonce.as_bytes());
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt output of [`RecordCipher::seal`].
    ///
    /// # Errors
    ///
    /// Returns an error if the input is too short or authentication fails.
    pub fn open(&self, sealed: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        if sealed.len() < XCHACHA20_NONCE_SIZE + AEAD_TAG_SIZE {
            return Err(CryptoError::AeadDecryptFailed);
        }
        let (nonce, ciphertext) = sealed.split_at(XCHACHA20_NONCE_SIZE);
        let nonce = XChaCha20Nonce::try_from_slice(nonce)?;
        self.decrypt(&nonce, ciphertext, aad)
    }
}

impl std::fmt::Debug for RecordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> RecordCipher {
        RecordCipher::from_aead_key(&AeadKey::generate())
    }

    #[test]
    fn seal_open_roundtrip() {
        let cipher = cipher();

        let sealed = cipher.seal(b"alice", b"aad").unwrap();
        let opened = cipher.open(&sealed, b"aad").unwrap();

        assert_eq!(opened, b"alice");
    }

    #[test]
    fn sealed_layout() {
        let cipher = cipher();
        let sealed = cipher.seal(b"hello", b"").unwrap();

        assert_eq!(sealed.len(), XCHACHA20_NONCE_SIZE + 5 + AEAD_TAG_SIZE);
    }

    #[test]
    fn nonces_are_fresh_per_seal() {
        let cipher = cipher();

        let a = cipher.seal(b"same", b"aad").unwrap();
        let b = cipher.seal(b"same", b"aad").unwrap();

        assert_ne!(a[..XCHACHA20_NONCE_SIZE], b[..XCHACHA20_NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = cipher().seal(b"secret", b"aad").unwrap();
        let result = cipher().open(&sealed, b"aad");

        assert!(matches!(result, Err(CryptoError::AeadDecryptFailed)));
    }

    #[test]
    fn wrong_aad_fails() {
        let cipher = cipher();
        let sealed = cipher.seal(b"secret", b"v1").unwrap();

        assert!(matches!(
            cipher.open(&sealed, b"v2"),
            Err(CryptoError::AeadDecryptFailed)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let cipher = cipher();
        let mut sealed = cipher.seal(b"secret", b"aad").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;

        assert!(matches!(
            cipher.open(&sealed, b"aad"),
            Err(CryptoError::AeadDecryptFailed)
        ));
    }

    #[test]
    fn truncated_input_fails() {
        let cipher = cipher();
        let sealed = cipher.seal(b"secret", b"aad").unwrap();

        assert!(cipher.open(&sealed[..XCHACHA20_NONCE_SIZE], b"aad").is_err());
        assert!(cipher.open(&[], b"aad").is_err());
    }

    #[test]
    fn key_from_slice_checks_length() {
        assert!(AeadKey::try_from_slice(&[0u8; 31]).is_err());
        assert!(AeadKey::try_from_slice(&[0u8; AEAD_KEY_SIZE]).is_ok());
    }

    #[test]
    fn nonce_from_slice_checks_length() {
        let err = XChaCha20Nonce::try_from_slice(&[0u8; 12]).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidNonceLength {
                expected: XCHACHA20_NONCE_SIZE,
                actual: 12
            }
        ));
    }

    #[test]
    fn golden_vector_xchacha20poly1305() {
        // draft-irtf-cfrg-xchacha-03, appendix A.3.1
        let key = AeadKey::try_from_slice(
            &hex::decode("808182838485868788898a8b8c8d8e8f909192939495969798999a9b9c9d9e9f")
                .unwrap(),
        )
        .unwrap();
        let nonce = XChaCha20Nonce::try_from_slice(
            &hex::decode("404142434445464748494a4b4c4d4e4f5051525354555657").unwrap(),
        )
        .unwrap();
        let aad = hex::decode("50515253c0c1c2c3c4c5c6c7").unwrap();
        let plaintext = b"Ladies and Gentlemen of the class of '99: If I could offer you only one tip for the future, sunscreen would be it.";

        let cipher = RecordCipher::from_aead_key(&key);
        let ciphertext = cipher.encrypt(&nonce, plaintext, &aad).unwrap();

        let expected = hex::decode(
            "bd6d179d3e83d43b9576579493c0e939572a1700252bfaccbed2902c21396cbb731c7f1b0b4aa6440bf3a82f4eda7e39ae64c6708c54c216cb96b72e1213b4522f8c9ba40db5d945b11b69b982c1bb9e3f3fac2bc369488f76b2383565d3fff921f9664c97637da9768812f615c68b13b52ec0875924c1c7987947deafd8780acf49",
        )
        .unwrap();

        assert_eq!(ciphertext, expected);
        assert_eq!(cipher.decrypt(&nonce, &ciphertext, &aad).unwrap(), plaintext);
    }
}
