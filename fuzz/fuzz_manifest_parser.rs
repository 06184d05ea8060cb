//! Fuzz target for package manifest parsing and normalization.
//!
//! Run with: cargo +nightly fuzz run fuzz_manifest_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use moddef_core::PackageManifest;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(manifest) = PackageManifest::parse(s) {
        // A normalized manifest must survive a second pass unchanged.
        let again = manifest.clone().normalized().ok();
        assert_eq!(again.as_ref(), Some(&manifest));
    }
});
