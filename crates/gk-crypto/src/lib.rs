//! Gatekeeper crypto primitives.
//!
//! This crate is the cipher adapter behind the encrypted limiter snapshot. It
//! turns an operator-supplied secret into a 256-bit key and seals individual
//! snapshot records with XChaCha20-Poly1305.
//!
//! # Modules
//!
//! - [`kdf`] - HKDF-SHA256 derivation of the snapshot key from a secret string
//! - [`aead`] - XChaCha20-Poly1305 with random, prepended nonces
//!
//! # Example
//!
//! ```rust
//! use gk_crypto::{RecordCipher, SnapshotKey};
//!
//! let key = SnapshotKey::from_secret("correct horse battery staple").unwrap();
//! let cipher = RecordCipher::new(&key);
//!
//! let sealed = cipher.seal(b"alice 1 1700000000000", b"gatekeeper-snapshot/v1").unwrap();
//! let opened = cipher.open(&sealed, b"gatekeeper-snapshot/v1").unwrap();
//!
//! assert_eq!(opened, b"alice 1 1700000000000");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aead;
pub mod error;
pub mod kdf;

pub use aead::{AEAD_TAG_SIZE, AeadKey, RecordCipher, XCHACHA20_NONCE_SIZE, XChaCha20Nonce};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{SNAPSHOT_KEY_INFO, SNAPSHOT_KEY_SALT, SnapshotKey};
