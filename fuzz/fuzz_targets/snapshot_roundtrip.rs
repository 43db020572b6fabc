//! Snapshot Record Fuzz Target
//!
//! Builds a window from arbitrary timestamps and checks that an encoded
//! record decodes back to the same key and window.

#![no_main]

use std::sync::OnceLock;

use gk_ratelimit::{PrincipalWindow, SnapshotCodec};
use libfuzzer_sys::fuzz_target;

fn codec() -> &'static SnapshotCodec {
    static CODEC: OnceLock<SnapshotCodec> = OnceLock::new();
    CODEC.get_or_init(|| SnapshotCodec::from_secret("fuzz-secret").unwrap())
}

fuzz_target!(|input: (String, Vec<u64>)| {
    let (key, mut timestamps) = input;
    timestamps.sort_unstable();
    if timestamps.is_empty() {
        return;
    }
    let Some(window) = PrincipalWindow::from_timestamps(timestamps) else {
        return;
    };

    let line = codec().encode_record(&key, &window).unwrap();
    let (decoded_key, decoded) = codec().decode_record(&line).unwrap();

    assert_eq!(decoded_key, key);
    assert_eq!(decoded, window);
});
