//! Fuzz target for path normalization and the path-based tiers.
//!
//! Run with: cargo +nightly fuzz run fuzz_path_classifier
//!
//! The first byte picks a split point; the bytes before it become a package
//! mapping prefix and the rest become the file path.

#![no_main]

use libfuzzer_sys::fuzz_target;
use moddef_config::{ExplicitTagMode, LoaderConfig};
use moddef_core::classifier::{MappingTable, PathClassifier};
use moddef_core::path::{PrefixSegments, RelativePath};
use moddef_core::{InferenceEngine, PackageManifest};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let split = (data[0] as usize % (data.len() - 1)) + 1;
    let prefix = std::str::from_utf8(&data[1..split]).unwrap_or("Definitions/Things");
    let raw_path = std::str::from_utf8(&data[split..]).unwrap_or("");

    let Some(path) = RelativePath::parse(raw_path) else {
        return;
    };

    let config = LoaderConfig::default();
    let builtin = MappingTable::for_config(&config);
    let Some(root) = PrefixSegments::parse(&config.discovery.definitions_root) else {
        return;
    };
    let manifest = PackageManifest::new("fuzz")
        .with_custom_type(prefix, "Fuzzed")
        .with_content_folder(prefix, "Hinted");
    let classifier = PathClassifier::for_package(&builtin, &root, &manifest);
    let engine = InferenceEngine::new(&classifier, "$type", ExplicitTagMode::Always);

    // Path-only classification is deterministic.
    let first = engine.classify_path(&path);
    assert_eq!(first, engine.classify_path(&path));
});
