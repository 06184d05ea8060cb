//! Temp-dir mod trees.
//!
//! A [`TestModTree`] owns a temporary mods directory. Packages are added as
//! subdirectories with a `mod.json` manifest; definition files are written
//! relative to a package root.

use std::path::{Path, PathBuf};

use moddef_config::LoaderConfig;
use moddef_core::{
    DefinitionLoader, EventChannel, LoadError, LoadOutcome, PackageManifest,
};
use serde_json::{Value, json};
use tempfile::TempDir;

/// A mods directory that is deleted when dropped, even on panic.
pub struct TestModTree {
    dir: TempDir,
}

impl TestModTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// The mods directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The root directory of package `id`.
    pub fn package_dir(&self, id: &str) -> PathBuf {
        self.dir.path().join(id)
    }

    /// Write `mod.json` for a package in `<mods>/<manifest.id>/`.
    pub fn package(&self, manifest: &PackageManifest) -> &Self {
        let body = serde_json::to_string_pretty(manifest).expect("failed to encode manifest");
        self.file(&manifest.id, "mod.json", &body)
    }

    /// Write a raw file relative to a package root.
    pub fn file(&self, package: &str, rel: &str, body: &str) -> &Self {
        let path = self.package_dir(package).join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create directories");
        }
        std::fs::write(&path, body).expect("failed to write file");
        self
    }

    /// Write a JSON definition with the given id.
    pub fn definition(&self, package: &str, rel: &str, id: &str) -> &Self {
        self.definition_with(package, rel, json!({ "id": id }))
    }

    /// Write a JSON definition from an arbitrary document.
    pub fn definition_with(&self, package: &str, rel: &str, document: Value) -> &Self {
        let body = serde_json::to_string_pretty(&document).expect("failed to encode definition");
        self.file(package, rel, &body)
    }

    /// Write a loader config file into the mods directory and return its path.
    pub async fn config_file(&self, toml_content: &str) -> PathBuf {
        let path = self.dir.path().join("moddef.toml");
        tokio::fs::write(&path, toml_content)
            .await
            .expect("failed to write test config");
        path
    }

    /// Run a load pass over the tree.
    pub fn load(&self, config: LoaderConfig, events: &mut EventChannel) -> Result<LoadOutcome, LoadError> {
        let loader = DefinitionLoader::new(config).expect("invalid test config");
        loader.load_dir(self.path(), events)
    }

    /// Run a load pass with default config and no observers.
    pub fn load_default(&self) -> Result<LoadOutcome, LoadError> {
        self.load(LoaderConfig::default(), &mut EventChannel::new())
    }
}

impl Default for TestModTree {
    fn default() -> Self {
        Self::new()
    }
}
