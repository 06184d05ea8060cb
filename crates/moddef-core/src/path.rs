//! Normalized package-relative paths.
//!
//! Every path the classifier sees is forward-slash separated, relative to
//! the package root, with `.` and empty segments removed. Matching is
//! case-insensitive, so a lowercase copy is kept alongside the original.

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

/// A normalized, package-relative file path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RelativePath {
    normalized: String,
    lowered: String,
}

impl RelativePath {
    /// Normalize a string path. Accepts `/` and `\` separators.
    ///
    /// Returns `None` for empty, absolute, or `..`-containing paths.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.starts_with('/') || raw.starts_with('\\') {
            return None;
        }
        let mut segments = Vec::new();
        for segment in raw.split(['/', '\\']) {
            match segment {
                "" | "." => continue,
                ".." => return None,
                s if s.ends_with(':') => return None,
                s => segments.push(s),
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(Self::from_normalized(segments.join("/")))
    }

    /// Build the path of `file` relative to `root`.
    ///
    /// Returns `None` when `file` is not under `root` or the remainder
    /// cannot be represented as UTF-8.
    pub fn from_root(root: &Path, file: &Path) -> Option<Self> {
        let rel = file.strip_prefix(root).ok()?;
        let mut segments = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(s) => segments.push(s.to_str()?),
                Component::CurDir => continue,
                _ => return None,
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(Self::from_normalized(segments.join("/")))
    }

    fn from_normalized(normalized: String) -> Self {
        let lowered = normalized.to_lowercase();
        Self {
            normalized,
            lowered,
        }
    }

    /// The normalized path with its original casing.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Original-case segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.normalized.split('/')
    }

    /// Lowercased segments, for case-insensitive matching.
    pub fn lowered_segments(&self) -> impl Iterator<Item = &str> {
        self.lowered.split('/')
    }

    /// Number of segments, including the file name.
    pub fn depth(&self) -> usize {
        self.normalized.split('/').count()
    }

    /// The final segment's extension, if any.
    pub fn extension(&self) -> Option<&str> {
        let file_name = self.normalized.rsplit('/').next()?;
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Some(ext),
            _ => None,
        }
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl From<RelativePath> for String {
    fn from(path: RelativePath) -> Self {
        path.normalized
    }
}

impl TryFrom<String> for RelativePath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RelativePath::parse(&value).ok_or_else(|| format!("invalid relative path {value:?}"))
    }
}

/// A directory prefix split into lowercase segments, ready for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixSegments(Vec<String>);

impl PrefixSegments {
    /// Split and lowercase a prefix. Returns `None` when the prefix is not a
    /// valid relative path.
    pub fn parse(prefix: &str) -> Option<Self> {
        let path = RelativePath::parse(prefix)?;
        Some(Self(path.lowered_segments().map(str::to_string).collect()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this prefix covers whole directory segments of `path`.
    ///
    /// The prefix must be strictly shorter than the path, so a prefix never
    /// matches the file name itself, and `Definitions/Audio` does not match
    /// `Definitions/AudioExtra/x.json`.
    pub fn is_dir_prefix_of(&self, path_segments: &[&str]) -> bool {
        self.0.len() < path_segments.len()
            && self.0.iter().zip(path_segments).all(|(a, b)| a == b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_normalizes_separators() {
        let path = RelativePath::parse("Definitions\\Audio//Music/./x.json").unwrap();
        assert_eq!(path.as_str(), "Definitions/Audio/Music/x.json");
        assert_eq!(path.depth(), 4);
    }

    #[test]
    fn test_parse_rejects_escapes() {
        assert!(RelativePath::parse("").is_none());
        assert!(RelativePath::parse("./").is_none());
        assert!(RelativePath::parse("/etc/passwd").is_none());
        assert!(RelativePath::parse("a/../b.json").is_none());
        assert!(RelativePath::parse("C:/mods/x.json").is_none());
    }

    #[test]
    fn test_from_root() {
        let root = Path::new("/mods/base");
        let file = Path::new("/mods/base/Definitions/Audio/x.json");
        let path = RelativePath::from_root(root, file).unwrap();
        assert_eq!(path.as_str(), "Definitions/Audio/x.json");
        assert!(RelativePath::from_root(root, Path::new("/elsewhere/x.json")).is_none());
    }

    #[test]
    fn test_lowered_segments_keep_original() {
        let path = RelativePath::parse("Definitions/Audio/X.json").unwrap();
        let lowered: Vec<&str> = path.lowered_segments().collect();
        assert_eq!(lowered, vec!["definitions", "audio", "x.json"]);
        assert_eq!(path.to_string(), "Definitions/Audio/X.json");
    }

    #[test]
    fn test_extension() {
        assert_eq!(RelativePath::parse("a/b.json").unwrap().extension(), Some("json"));
        assert_eq!(RelativePath::parse("a/b.tar.toml").unwrap().extension(), Some("toml"));
        assert_eq!(RelativePath::parse("a/.hidden").unwrap().extension(), None);
        assert_eq!(RelativePath::parse("a/README").unwrap().extension(), None);
    }

    #[test]
    fn test_prefix_matches_whole_segments_only() {
        let prefix = PrefixSegments::parse("Definitions/Audio").unwrap();
        let path = RelativePath::parse("definitions/audio/music/x.json").unwrap();
        let segments: Vec<&str> = path.lowered_segments().collect();
        assert!(prefix.is_dir_prefix_of(&segments));

        let path = RelativePath::parse("Definitions/AudioExtra/x.json").unwrap();
        let segments: Vec<&str> = path.lowered_segments().collect();
        assert!(!prefix.is_dir_prefix_of(&segments));

        // A prefix never swallows the file name.
        let path = RelativePath::parse("Definitions/Audio").unwrap();
        let segments: Vec<&str> = path.lowered_segments().collect();
        assert!(!prefix.is_dir_prefix_of(&segments));
    }
}
