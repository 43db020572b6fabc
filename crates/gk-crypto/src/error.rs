//! Error types for Gatekeeper cryptographic operations.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The configured secret was empty.
    #[error("snapshot secret must not be empty")]
    EmptySecret,

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes.
        expected: usize,
        /// Actual key length provided.
        actual: usize,
    },

    /// Invalid nonce length.
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Expected nonce length in bytes.
        expected: usize,
        /// Actual nonce length provided.
        actual: usize,
    },

    /// AEAD encryption failed.
    #[error("AEAD encryption failed")]
    AeadEncryptFailed,

    /// AEAD decryption failed (authentication failed or invalid ciphertext).
    #[error("AEAD decryption failed: authentication or decryption error")]
    AeadDecryptFailed,

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),
}

/// Result type alias for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
