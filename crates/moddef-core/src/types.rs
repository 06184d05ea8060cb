//! Identifier and type-name value types shared across the pipeline.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The semantic type of a definition (e.g. "Audio", "Map").
///
/// Always a real, resolved type name. A file whose type could not be
/// inferred never gets one of these; it gets a
/// [`ClassificationError`](crate::error::ClassificationError) instead.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionType(String);

impl DefinitionType {
    /// Create a type name. Surrounding whitespace is trimmed.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DefinitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DefinitionType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Borrow<str> for DefinitionType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The components of a namespaced identifier,
/// `namespace:type:category/[subcategory/]name`.
///
/// ```text
/// base:audio:music/towns/mus_dewford
/// base:map:hoenn/littleroot_town
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionId<'a> {
    pub namespace: &'a str,
    pub kind: &'a str,
    pub category: &'a str,
    pub subcategory: Option<&'a str>,
    pub name: &'a str,
}

impl<'a> DefinitionId<'a> {
    /// Parse a namespaced identifier. Returns `None` when `id` does not have
    /// the expected shape.
    ///
    /// Namespace, category and name segments are lowercase ASCII
    /// alphanumerics or `_`; the type segment is lowercase letters only.
    pub fn parse(id: &'a str) -> Option<Self> {
        let (namespace, rest) = id.split_once(':')?;
        let (kind, path) = rest.split_once(':')?;

        if !is_segment(namespace) || kind.is_empty() || !kind.bytes().all(|b| b.is_ascii_lowercase())
        {
            return None;
        }

        let parts: Vec<&str> = path.split('/').collect();
        if !parts.iter().all(|p| is_segment(p)) {
            return None;
        }
        match parts.as_slice() {
            [category, name] => Some(Self {
                namespace,
                kind,
                category,
                subcategory: None,
                name,
            }),
            [category, subcategory, name] => Some(Self {
                namespace,
                kind,
                category,
                subcategory: Some(subcategory),
                name,
            }),
            _ => None,
        }
    }

    /// Whether `id` is a well-formed namespaced identifier.
    pub fn is_valid(id: &str) -> bool {
        DefinitionId::parse(id).is_some()
    }
}

fn is_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_definition_type_trims() {
        assert_eq!(DefinitionType::new("  Audio "), DefinitionType::from("Audio"));
        assert_eq!(DefinitionType::from("Map").to_string(), "Map");
    }

    #[test]
    fn test_parse_two_part_path() {
        let id = DefinitionId::parse("base:map:hoenn/littleroot_town").unwrap();
        assert_eq!(id.namespace, "base");
        assert_eq!(id.kind, "map");
        assert_eq!(id.category, "hoenn");
        assert_eq!(id.subcategory, None);
        assert_eq!(id.name, "littleroot_town");
    }

    #[test]
    fn test_parse_with_subcategory() {
        let id = DefinitionId::parse("base:audio:music/towns/mus_dewford").unwrap();
        assert_eq!(id.category, "music");
        assert_eq!(id.subcategory, Some("towns"));
        assert_eq!(id.name, "mus_dewford");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "littleroot_town",
            "base:map",
            "base:map:hoenn",
            "Base:map:hoenn/town",
            "base:map2:hoenn/town",
            "base:map:hoenn/a/b/c",
            "base:map:hoenn//town",
            "base:map:hoenn/Town",
        ] {
            assert!(!DefinitionId::is_valid(bad), "{bad:?} should be rejected");
        }
    }
}
