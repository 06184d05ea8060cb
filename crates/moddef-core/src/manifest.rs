//! Package manifests and package discovery.
//!
//! Each package lives in its own directory under the mods directory and
//! carries a JSON manifest (`mod.json` by default):
//!
//! ```json
//! {
//!   "id": "expansion",
//!   "name": "Expansion Pack",
//!   "version": "1.2.0",
//!   "priority": 10,
//!   "dependencies": ["base"],
//!   "contentFolders": { "Sounds": "Audio" },
//!   "customDefinitionTypes": { "Definitions/Audio/Jingles": "Jingle" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use moddef_config::mappings::check_relative_path;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// Errors from reading or validating a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid manifest: {0}")]
    Invalid(String),
}

/// The declared metadata of one content package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    /// Globally unique package id.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Free-form version string.
    #[serde(default)]
    pub version: Option<String>,

    /// Secondary ordering key among packages that are ready to load at the
    /// same time. Lower loads first.
    #[serde(default)]
    pub priority: i32,

    /// Package ids that must load before this one. Duplicates are dropped,
    /// first occurrence kept.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Content folder → type hint. Every folder listed here is scanned in
    /// addition to the definitions root.
    #[serde(default)]
    pub content_folders: BTreeMap<String, String>,

    /// Package-local path-prefix → type mappings.
    #[serde(default)]
    pub custom_definition_types: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Create a manifest with just an id. Mostly useful in tests and tools.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            version: None,
            priority: 0,
            dependencies: Vec::new(),
            content_folders: BTreeMap::new(),
            custom_definition_types: BTreeMap::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_content_folder(mut self, folder: &str, type_name: &str) -> Self {
        self.content_folders
            .insert(folder.to_string(), type_name.to_string());
        self
    }

    pub fn with_custom_type(mut self, prefix: &str, type_name: &str) -> Self {
        self.custom_definition_types
            .insert(prefix.to_string(), type_name.to_string());
        self
    }

    /// Parse and validate a manifest from JSON.
    pub fn parse(s: &str) -> Result<Self, ManifestError> {
        let manifest: PackageManifest = serde_json::from_str(s)?;
        manifest.normalized()
    }

    /// Validate the manifest and drop duplicate dependencies.
    pub fn normalized(mut self) -> Result<Self, ManifestError> {
        self.id = self.id.trim().to_string();
        if self.id.is_empty() {
            return Err(ManifestError::Invalid("id must not be empty".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        let mut dependencies = Vec::with_capacity(self.dependencies.len());
        for (i, dep) in self.dependencies.iter().enumerate() {
            let dep = dep.trim();
            if dep.is_empty() {
                return Err(ManifestError::Invalid(format!(
                    "dependencies[{i}] must not be empty"
                )));
            }
            if seen.insert(dep.to_string()) {
                dependencies.push(dep.to_string());
            }
        }
        self.dependencies = dependencies;

        for (folder, type_name) in &self.content_folders {
            check_relative_path(folder)
                .map_err(|e| ManifestError::Invalid(format!("contentFolders: {e}")))?;
            if type_name.trim().is_empty() {
                return Err(ManifestError::Invalid(format!(
                    "contentFolders[{folder:?}] must name a type"
                )));
            }
        }
        for (prefix, type_name) in &self.custom_definition_types {
            check_relative_path(prefix)
                .map_err(|e| ManifestError::Invalid(format!("customDefinitionTypes: {e}")))?;
            if type_name.trim().is_empty() {
                return Err(ManifestError::Invalid(format!(
                    "customDefinitionTypes[{prefix:?}] must name a type"
                )));
            }
        }

        Ok(self)
    }
}

/// A manifest together with the directory it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub manifest: PackageManifest,
    pub root: PathBuf,
}

impl Package {
    pub fn new(manifest: PackageManifest, root: impl Into<PathBuf>) -> Self {
        Self {
            manifest,
            root: root.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    /// Load `<dir>/<manifest_file>`.
    pub fn load(dir: &Path, manifest_file: &str) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(dir.join(manifest_file))?;
        let manifest = PackageManifest::parse(&content)?;
        Ok(Self::new(manifest, dir))
    }
}

/// A package directory whose manifest could not be loaded.
#[derive(Debug)]
pub struct BrokenPackage {
    pub dir: PathBuf,
    pub error: ManifestError,
}

/// Result of listing a mods directory.
#[derive(Debug, Default)]
pub struct PackageListing {
    /// Successfully loaded packages, in directory-name order.
    pub packages: Vec<Package>,
    /// Directories that hold a manifest that failed to load.
    pub broken: Vec<BrokenPackage>,
}

/// List every immediate subdirectory of `mods_dir` that holds
/// `manifest_file`. Directories without a manifest are ignored.
pub fn discover_packages(
    mods_dir: &Path,
    manifest_file: &str,
) -> Result<PackageListing, std::io::Error> {
    let mut listing = PackageListing::default();

    for entry in WalkDir::new(mods_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_dir() || !entry.path().join(manifest_file).is_file() {
            continue;
        }
        match Package::load(entry.path(), manifest_file) {
            Ok(package) => listing.packages.push(package),
            Err(error) => listing.broken.push(BrokenPackage {
                dir: entry.path().to_path_buf(),
                error,
            }),
        }
    }

    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_manifest() {
        let json = r#"{
            "id": "expansion",
            "name": "Expansion Pack",
            "version": "1.2.0",
            "priority": 10,
            "dependencies": ["base", "music", "base"],
            "contentFolders": { "Sounds": "Audio" },
            "customDefinitionTypes": { "Definitions/Audio/Jingles": "Jingle" }
        }"#;
        let manifest = PackageManifest::parse(json).unwrap();
        assert_eq!(manifest.id, "expansion");
        assert_eq!(manifest.priority, 10);
        assert_eq!(manifest.dependencies, vec!["base", "music"]);
        assert_eq!(manifest.content_folders.get("Sounds").unwrap(), "Audio");
        assert_eq!(
            manifest
                .custom_definition_types
                .get("Definitions/Audio/Jingles")
                .unwrap(),
            "Jingle"
        );
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = PackageManifest::parse(r#"{ "id": "base" }"#).unwrap();
        assert_eq!(manifest, PackageManifest::new("base"));
    }

    #[test]
    fn test_rejects_empty_id() {
        let err = PackageManifest::parse(r#"{ "id": "  " }"#).unwrap_err();
        assert!(matches!(err, ManifestError::Invalid(_)));
    }

    #[test]
    fn test_rejects_missing_id() {
        let err = PackageManifest::parse(r#"{ "name": "x" }"#).unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn test_rejects_escaping_content_folder() {
        let json = r#"{ "id": "bad", "contentFolders": { "../other": "Audio" } }"#;
        assert!(PackageManifest::parse(json).is_err());
    }

    #[test]
    fn test_rejects_empty_custom_type() {
        let json = r#"{ "id": "bad", "customDefinitionTypes": { "Data/X": "" } }"#;
        assert!(PackageManifest::parse(json).is_err());
    }

    #[test]
    fn test_discover_packages_sorted_and_broken() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        for (dir, body) in [
            ("zeta", r#"{ "id": "zeta" }"#),
            ("alpha", r#"{ "id": "alpha" }"#),
            ("broken", "{ not json"),
        ] {
            std::fs::create_dir_all(root.join(dir)).unwrap();
            std::fs::write(root.join(dir).join("mod.json"), body).unwrap();
        }
        std::fs::create_dir_all(root.join("no-manifest")).unwrap();
        std::fs::write(root.join("stray.json"), "{}").unwrap();

        let listing = discover_packages(root, "mod.json").unwrap();
        let ids: Vec<&str> = listing.packages.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
        assert_eq!(listing.broken.len(), 1);
        assert!(listing.broken[0].dir.ends_with("broken"));
    }
}
