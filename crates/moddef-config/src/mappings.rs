//! Built-in path mappings: prefix → definition type rules.
//!
//! A mapping rule says "every definition file under this directory prefix is
//! of this type". The loader merges the built-in table, the `[[mappings]]`
//! entries from the config file and each package's own
//! `customDefinitionTypes` before classifying that package's files. On equal
//! prefix length a package rule beats a configured one, which beats a
//! shipped one.

use serde::{Deserialize, Serialize};

/// A single `prefix → type` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    /// Directory prefix relative to the package root, forward-slash separated
    /// (e.g. "Definitions/Maps/Regions"). Compared case-insensitively.
    pub prefix: String,
    /// Definition type assigned to files under the prefix (e.g. "Map").
    #[serde(rename = "type")]
    pub type_name: String,
}

impl MappingRule {
    /// Create a new rule.
    pub fn new(prefix: &str, type_name: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            type_name: type_name.to_string(),
        }
    }
}

/// The built-in mapping table shipped with the loader.
///
/// Only the nested layouts need an entry here; a plain
/// `Definitions/<Type>/...` layout is already covered by the directory
/// convention.
pub fn builtin_mappings() -> Vec<MappingRule> {
    [
        ("Definitions/Audio", "Audio"),
        ("Definitions/BattleScenes", "BattleScene"),
        ("Definitions/Maps/Regions", "Map"),
        ("Definitions/Maps/Tilesets", "Tileset"),
        ("Definitions/Maps/Sections", "MapSection"),
        ("Definitions/Maps/Popups/Themes", "PopupTheme"),
        ("Definitions/Maps/Popups/Backgrounds", "PopupBackground"),
        ("Definitions/Maps/Popups/Outlines", "PopupOutline"),
        ("Definitions/Regions", "Region"),
        ("Definitions/Sprites", "Sprite"),
        ("Definitions/Weather", "Weather"),
    ]
    .into_iter()
    .map(|(prefix, type_name)| MappingRule::new(prefix, type_name))
    .collect()
}

/// Check that `path` is a usable package-relative path: non-empty, not
/// absolute, and without `..` segments. Both separators are accepted.
///
/// Returns a human-readable reason on failure.
pub fn check_relative_path(path: &str) -> Result<(), String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err("path must not be empty".to_string());
    }
    if trimmed.starts_with('/') || trimmed.starts_with('\\') || has_drive_prefix(trimmed) {
        return Err(format!("path {trimmed:?} must be relative"));
    }
    if trimmed.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(format!("path {trimmed:?} must not contain '..'"));
    }
    Ok(())
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
