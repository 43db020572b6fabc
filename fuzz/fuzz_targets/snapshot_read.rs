//! Snapshot Reader Fuzz Target
//!
//! Feeds arbitrary bytes to the snapshot reader and single-record decoder.
//! Goal: corrupt files are skipped or rejected, never a panic.

#![no_main]

use std::io::Cursor;
use std::sync::OnceLock;

use gk_ratelimit::SnapshotCodec;
use libfuzzer_sys::fuzz_target;

fn codec() -> &'static SnapshotCodec {
    static CODEC: OnceLock<SnapshotCodec> = OnceLock::new();
    CODEC.get_or_init(|| SnapshotCodec::from_secret("fuzz-secret").unwrap())
}

fuzz_target!(|data: &[u8]| {
    // Whole-file path: header handling, line splitting, per-line skips
    if let Ok((principals, report)) = codec().read(Cursor::new(data)) {
        assert_eq!(principals.len(), report.loaded);
    }

    // Single-line path: hex, AEAD open, JSON record validation
    if let Ok(line) = std::str::from_utf8(data) {
        let _ = codec().decode_record(line);
    }
});
