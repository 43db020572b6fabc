//! Encrypted snapshot codec.
//!
//! File layout (version 1):
//!
//! ```text
//! #gatekeeper-snapshot v1
//! <hex(nonce || xchacha20poly1305(record_json))>
//! <hex(nonce || xchacha20poly1305(record_json))>
//! ...
//! ```
//!
//! Each line is sealed on its own, so a truncated or corrupted line costs one
//! principal's window and nothing else.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use gk_crypto::{CryptoError, RecordCipher, SnapshotKey};
use gk_telemetry::metrics;
use serde::{Deserialize, Serialize};

use crate::window::PrincipalWindow;

/// Header line written at the top of every snapshot.
pub const SNAPSHOT_HEADER: &str = "#gatekeeper-snapshot v1";

/// Prefix shared by every snapshot header version.
const HEADER_PREFIX: &str = "#gatekeeper-snapshot";

/// Associated data bound into every record.
const RECORD_AAD: &[u8] = b"gatekeeper-snapshot/v1";

/// Snapshot errors that abort a whole save or load.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The snapshot file could not be opened, read, or written.
    #[error("snapshot I/O error at {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The stream could not be read or written.
    #[error("snapshot stream error: {0}")]
    Stream(#[from] io::Error),

    /// The header names a format this build cannot read.
    #[error("unsupported snapshot version: {0:?}")]
    UnsupportedVersion(String),

    /// The secret could not be turned into a key, or a record could not be sealed.
    #[error("snapshot crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// A record could not be serialized.
    #[error("snapshot encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SnapshotError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Why a single snapshot line was discarded.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Line is not valid UTF-8.
    #[error("line is not valid UTF-8")]
    Utf8,

    /// Line is not valid hex.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Authentication or decryption failed.
    #[error("decryption failed")]
    Decrypt,

    /// Decrypted payload is not a valid record.
    #[error("malformed record: {0}")]
    Parse(#[from] serde_json::Error),

    /// Declared count does not match the number of timestamps.
    #[error("record declares {declared} timestamps but carries {actual}")]
    CountMismatch {
        /// Count field.
        declared: u32,
        /// Timestamps present.
        actual: usize,
    },

    /// Record has no timestamps.
    #[error("record has no timestamps")]
    Empty,

    /// Timestamps are not in non-decreasing order.
    #[error("record timestamps are out of order")]
    Unordered,
}

impl RecordError {
    /// Short label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Utf8 | Self::Hex(_) => "encoding",
            Self::Decrypt => "decrypt",
            Self::Parse(_) => "parse",
            Self::CountMismatch { .. } | Self::Empty | Self::Unordered => "invalid",
        }
    }
}

/// Outcome of a snapshot load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Records restored.
    pub loaded: usize,
    /// Lines discarded as corrupt.
    pub skipped: usize,
}

/// Plaintext form of one record.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotRecord {
    key: String,
    count: u32,
    timestamps: Vec<u64>,
}

/// Converts principal windows to and from the encrypted line format.
#[derive(Debug)]
pub struct SnapshotCodec {
    cipher: RecordCipher,
}

impl SnapshotCodec {
    /// Create a codec from a derived key.
    #[must_use]
    pub fn new(key: &SnapshotKey) -> Self {
        Self {
            cipher: RecordCipher::new(key),
        }
    }

    /// Derive the key from `secret` and create a codec.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is empty.
    pub fn from_secret(secret: &str) -> Result<Self, SnapshotError> {
        Ok(Self::new(&SnapshotKey::from_secret(secret)?))
    }

    /// Encode one principal's window as a hex line (without newline).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or encryption fails.
    pub fn encode_record(&self, key: &str, window: &PrincipalWindow) -> Result<String, SnapshotError> {
        let record = SnapshotRecord {
            key: key.to_owned(),
            count: u32::try_from(window.len()).unwrap_or(u32::MAX),
            timestamps: window.iter().collect(),
        };
        let plaintext = serde_json::to_vec(&record)?;
        let sealed = self.cipher.seal(&plaintext, RECORD_AAD)?;
        Ok(hex::encode(sealed))
    }

    /// Decode one hex line back into a principal and its window.
    ///
    /// # Errors
    ///
    /// Returns the reason the line was rejected.
    pub fn decode_record(&self, line: &str) -> Result<(String, PrincipalWindow), RecordError> {
        let sealed = hex::decode(line.trim())?;
        let plaintext = self
            .cipher
            .open(&sealed, RECORD_AAD)
            .map_err(|_| RecordError::Decrypt)?;
        let record: SnapshotRecord = serde_json::from_slice(&plaintext)?;

        if record.timestamps.is_empty() {
            return Err(RecordError::Empty);
        }
        if record.count as usize != record.timestamps.len() {
            return Err(RecordError::CountMismatch {
                declared: record.count,
                actual: record.timestamps.len(),
            });
        }
        let window = PrincipalWindow::from_timestamps(record.timestamps).ok_or(RecordError::Unordered)?;

        Ok((record.key, window))
    }

    /// Write the header and one line per non-empty window, sorted by key.
    ///
    /// Returns the number of records written.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be sealed or the writer fails.
    pub fn write<W: Write>(
        &self,
        principals: &HashMap<String, PrincipalWindow>,
        out: &mut W,
    ) -> Result<usize, SnapshotError> {
        writeln!(out, "{SNAPSHOT_HEADER}")?;

        let mut keys: Vec<&String> = principals
            .iter()
            .filter(|(_, window)| !window.is_empty())
            .map(|(key, _)| key)
            .collect();
        keys.sort();

        for key in &keys {
            let line = self.encode_record(key, &principals[*key])?;
            writeln!(out, "{line}")?;
        }

        Ok(keys.len())
    }

    /// Read a snapshot stream, skipping lines that fail to decode.
    ///
    /// # Errors
    ///
    /// Returns an error only if the stream itself fails or the header names an
    /// unsupported version.
    pub fn read<R: BufRead>(
        &self,
        input: R,
    ) -> Result<(HashMap<String, PrincipalWindow>, LoadReport), SnapshotError> {
        let mut principals = HashMap::new();
        let mut report = LoadReport::default();
        // The header, if any, is the first non-blank line.
        let mut header_seen = false;

        for (index, raw) in input.split(b'\n').enumerate() {
            let raw = raw?;
            let line_no = index + 1;

            let Ok(line) = std::str::from_utf8(&raw) else {
                header_seen = true;
                skip(&mut report, line_no, &RecordError::Utf8);
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if !header_seen {
                header_seen = true;
                if line == SNAPSHOT_HEADER {
                    continue;
                }
                if line.starts_with(HEADER_PREFIX) {
                    return Err(SnapshotError::UnsupportedVersion(line.to_owned()));
                }
                tracing::warn!("snapshot has no version header; records may be unreadable");
            }

            match self.decode_record(line) {
                Ok((key, window)) => {
                    principals.insert(key, window);
                }
                Err(e) => skip(&mut report, line_no, &e),
            }
        }

        // Duplicate keys: the later record replaced the earlier one.
        report.loaded = principals.len();
        Ok((principals, report))
    }
}

fn skip(report: &mut LoadReport, line_no: usize, err: &RecordError) {
    tracing::warn!(line = line_no, reason = err.reason(), error = %err, "skipping snapshot record");
    metrics::record_snapshot_skipped(err.reason());
    report.skipped += 1;
}
