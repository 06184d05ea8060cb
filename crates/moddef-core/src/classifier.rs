//! Path classifier: the I/O-free classification tiers.
//!
//! A [`MappingTable`] holds `prefix → type` rules sorted once, longest prefix
//! first. [`PathClassifier`] bundles the tables for one package (built-in
//! rules merged with the package's own, plus its content-folder hints) and is
//! reused for every file of that package.

use std::fmt;

use moddef_config::{LoaderConfig, MappingRule, builtin_mappings};
use tracing::warn;

use crate::error::TypeCandidate;
use crate::manifest::PackageManifest;
use crate::path::{PrefixSegments, RelativePath};
use crate::types::DefinitionType;

/// Where a mapping rule came from. On equal prefix length, the variant
/// declared first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MappingSource {
    /// `customDefinitionTypes` in the package manifest.
    Package,
    /// `contentFolders` in the package manifest.
    ContentFolder,
    /// The config file's `[[mappings]]`.
    Config,
    /// The shipped table.
    BuiltIn,
}

impl fmt::Display for MappingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingSource::Package => write!(f, "package mapping"),
            MappingSource::ContentFolder => write!(f, "content folder"),
            MappingSource::Config => write!(f, "configured mapping"),
            MappingSource::BuiltIn => write!(f, "built-in mapping"),
        }
    }
}

/// The outcome of one classification tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOutcome {
    Resolved(TypeCandidate),
    Inconclusive,
    /// Equal-precedence claims disagree.
    Ambiguous(Vec<TypeCandidate>),
}

#[derive(Debug, Clone)]
struct Mapping {
    prefix: String,
    segments: PrefixSegments,
    type_name: DefinitionType,
    source: MappingSource,
}

impl Mapping {
    fn new(prefix: &str, type_name: &str, source: MappingSource) -> Option<Self> {
        let segments = PrefixSegments::parse(prefix)?;
        let type_name = DefinitionType::new(type_name);
        if type_name.as_str().is_empty() {
            return None;
        }
        Some(Self {
            prefix: prefix.to_string(),
            segments,
            type_name,
            source,
        })
    }

    fn candidate(&self) -> TypeCandidate {
        TypeCandidate {
            type_name: self.type_name.clone(),
            origin: format!("{} {:?}", self.source, self.prefix),
        }
    }
}

/// A sorted set of prefix mappings.
///
/// Sorted by segment count (descending), then source, then prefix, so the
/// first match found is the longest and, among equals, the preferred source.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    entries: Vec<Mapping>,
}

impl MappingTable {
    /// Build a table of built-in rules.
    pub fn builtin(rules: &[MappingRule]) -> Self {
        Self::sorted(Self::entries(rules, MappingSource::BuiltIn))
    }

    /// The shipped table plus the config file's `[[mappings]]`. A configured
    /// rule outranks a shipped one of the same length.
    pub fn for_config(config: &LoaderConfig) -> Self {
        let mut entries = Self::entries(&builtin_mappings(), MappingSource::BuiltIn);
        entries.extend(Self::entries(&config.mappings, MappingSource::Config));
        Self::sorted(entries)
    }

    fn entries(rules: &[MappingRule], source: MappingSource) -> Vec<Mapping> {
        rules
            .iter()
            .filter_map(|rule| {
                let mapping = Mapping::new(&rule.prefix, &rule.type_name, source);
                if mapping.is_none() {
                    warn!(prefix = %rule.prefix, %source, "Ignoring invalid mapping");
                }
                mapping
            })
            .collect()
    }

    fn sorted(mut entries: Vec<Mapping>) -> Self {
        entries.sort_by(|a, b| {
            b.segments
                .len()
                .cmp(&a.segments.len())
                .then(a.source.cmp(&b.source))
                .then_with(|| a.prefix.cmp(&b.prefix))
        });
        Self { entries }
    }

    /// This table merged with extra rules, re-sorted once.
    fn merged<'a>(
        &self,
        extra: impl IntoIterator<Item = (&'a String, &'a String)>,
        source: MappingSource,
    ) -> Self {
        let mut entries = self.entries.clone();
        for (prefix, type_name) in extra {
            match Mapping::new(prefix, type_name, source) {
                Some(mapping) => entries.push(mapping),
                None => warn!(%prefix, %source, "Ignoring invalid mapping"),
            }
        }
        Self::sorted(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Longest-prefix match over lowercased path segments.
    ///
    /// Every mapping sharing the winner's length and source is consulted;
    /// any that names a different type makes the outcome ambiguous.
    pub fn classify(&self, path_segments: &[&str]) -> TierOutcome {
        let mut winner: Option<&Mapping> = None;
        let mut rivals: Vec<&Mapping> = Vec::new();

        for mapping in &self.entries {
            if let Some(w) = winner
                && (mapping.segments.len() != w.segments.len() || mapping.source != w.source)
            {
                break;
            }
            if !mapping.segments.is_dir_prefix_of(path_segments) {
                continue;
            }
            match winner {
                None => winner = Some(mapping),
                Some(w) if w.type_name != mapping.type_name => rivals.push(mapping),
                Some(_) => {}
            }
        }

        match winner {
            None => TierOutcome::Inconclusive,
            Some(w) if rivals.is_empty() => TierOutcome::Resolved(w.candidate()),
            Some(w) => {
                let mut candidates = vec![w.candidate()];
                candidates.extend(rivals.iter().map(|m| m.candidate()));
                TierOutcome::Ambiguous(candidates)
            }
        }
    }
}

/// The path-based tiers for one package, built once per package pass.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    mappings: MappingTable,
    content_folders: MappingTable,
    definitions_root: PrefixSegments,
}

impl PathClassifier {
    pub fn for_package(
        builtin: &MappingTable,
        definitions_root: &PrefixSegments,
        manifest: &PackageManifest,
    ) -> Self {
        Self {
            mappings: builtin.merged(&manifest.custom_definition_types, MappingSource::Package),
            content_folders: MappingTable::default()
                .merged(&manifest.content_folders, MappingSource::ContentFolder),
            definitions_root: definitions_root.clone(),
        }
    }

    /// Tier 2: merged built-in and package mappings.
    pub fn mapping_tier(&self, path_segments: &[&str]) -> TierOutcome {
        self.mappings.classify(path_segments)
    }

    /// Tier 3: `<definitions root>/<Type>/.../file` → `Type`.
    ///
    /// A file sitting directly in the definitions root has no type directory
    /// and is inconclusive.
    pub fn convention_tier(&self, path: &RelativePath, path_segments: &[&str]) -> TierOutcome {
        let root_len = self.definitions_root.len();
        if path_segments.len() < root_len + 2
            || !self.definitions_root.is_dir_prefix_of(path_segments)
        {
            return TierOutcome::Inconclusive;
        }
        match path.segments().nth(root_len) {
            Some(dir) => TierOutcome::Resolved(TypeCandidate {
                type_name: DefinitionType::new(dir),
                origin: format!("directory {dir:?}"),
            }),
            None => TierOutcome::Inconclusive,
        }
    }

    /// Tier 4: the package's content-folder type hints.
    pub fn content_folder_tier(&self, path_segments: &[&str]) -> TierOutcome {
        self.content_folders.classify(path_segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn segments(path: &RelativePath) -> Vec<&str> {
        path.lowered_segments().collect()
    }

    fn resolved_type(outcome: TierOutcome) -> Option<String> {
        match outcome {
            TierOutcome::Resolved(c) => Some(c.type_name.to_string()),
            _ => None,
        }
    }

    fn classifier(manifest: &PackageManifest, builtin: &[MappingRule]) -> PathClassifier {
        PathClassifier::for_package(
            &MappingTable::builtin(builtin),
            &PrefixSegments::parse("Definitions").unwrap(),
            manifest,
        )
    }

    #[test]
    fn test_longest_prefix_wins() {
        let rules = vec![
            MappingRule::new("Definitions/Audio", "A"),
            MappingRule::new("Definitions/Audio/Music", "B"),
        ];
        let c = classifier(&PackageManifest::new("p"), &rules);
        let path = RelativePath::parse("Definitions/Audio/Music/x.json").unwrap();
        assert_eq!(resolved_type(c.mapping_tier(&segments(&path))), Some("B".into()));

        let path = RelativePath::parse("Definitions/Audio/Sfx/x.json").unwrap();
        assert_eq!(resolved_type(c.mapping_tier(&segments(&path))), Some("A".into()));
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let rules = vec![MappingRule::new("Definitions/Audio", "Audio")];
        let c = classifier(&PackageManifest::new("p"), &rules);
        let path = RelativePath::parse("definitions/AUDIO/x.json").unwrap();
        assert_eq!(resolved_type(c.mapping_tier(&segments(&path))), Some("Audio".into()));
    }

    #[test]
    fn test_package_beats_builtin_on_equal_length() {
        let rules = vec![MappingRule::new("Definitions/Audio", "Audio")];
        let manifest = PackageManifest::new("p").with_custom_type("Definitions/Audio", "Sound");
        let c = classifier(&manifest, &rules);
        let path = RelativePath::parse("Definitions/Audio/x.json").unwrap();
        assert_eq!(resolved_type(c.mapping_tier(&segments(&path))), Some("Sound".into()));
    }

    #[test]
    fn test_configured_mapping_beats_shipped_on_equal_length() {
        let mut config = LoaderConfig::default();
        config.mappings.push(MappingRule::new("Definitions/Audio", "Sound"));
        let c = PathClassifier::for_package(
            &MappingTable::for_config(&config),
            &PrefixSegments::parse("Definitions").unwrap(),
            &PackageManifest::new("p"),
        );
        let path = RelativePath::parse("Definitions/Audio/door.json").unwrap();
        match c.mapping_tier(&segments(&path)) {
            TierOutcome::Resolved(candidate) => {
                assert_eq!(candidate.type_name.as_str(), "Sound");
                assert_eq!(candidate.origin, r#"configured mapping "Definitions/Audio""#);
            }
            other => panic!("expected a resolved type, got {other:?}"),
        }
    }

    #[test]
    fn test_longer_builtin_beats_shorter_package() {
        let rules = vec![MappingRule::new("Definitions/Audio/Music", "Music")];
        let manifest = PackageManifest::new("p").with_custom_type("Definitions/Audio", "Sound");
        let c = classifier(&manifest, &rules);
        let path = RelativePath::parse("Definitions/Audio/Music/x.json").unwrap();
        assert_eq!(resolved_type(c.mapping_tier(&segments(&path))), Some("Music".into()));
    }

    #[test]
    fn test_equal_package_mappings_disagreeing_are_ambiguous() {
        let manifest = PackageManifest::new("p")
            .with_custom_type("Data/Things", "Thing")
            .with_custom_type("data/things", "Widget");
        let c = classifier(&manifest, &[]);
        let path = RelativePath::parse("Data/Things/x.json").unwrap();
        match c.mapping_tier(&segments(&path)) {
            TierOutcome::Ambiguous(candidates) => {
                let mut types: Vec<String> =
                    candidates.iter().map(|c| c.type_name.to_string()).collect();
                types.sort();
                assert_eq!(types, vec!["Thing", "Widget"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_equal_mappings_agreeing_resolve() {
        let rules = vec![
            MappingRule::new("Definitions/Audio", "Audio"),
            MappingRule::new("definitions/audio", "Audio"),
        ];
        let c = classifier(&PackageManifest::new("p"), &rules);
        let path = RelativePath::parse("Definitions/Audio/x.json").unwrap();
        assert_eq!(resolved_type(c.mapping_tier(&segments(&path))), Some("Audio".into()));
    }

    #[test]
    fn test_substring_prefix_does_not_match() {
        let rules = vec![MappingRule::new("Definitions/Audio", "Audio")];
        let c = classifier(&PackageManifest::new("p"), &rules);
        let path = RelativePath::parse("Definitions/AudioExtra/x.json").unwrap();
        assert_eq!(c.mapping_tier(&segments(&path)), TierOutcome::Inconclusive);
    }

    #[test]
    fn test_directory_convention() {
        let c = classifier(&PackageManifest::new("p"), &[]);
        let path = RelativePath::parse("Definitions/Weather/rain.json").unwrap();
        assert_eq!(
            resolved_type(c.convention_tier(&path, &segments(&path))),
            Some("Weather".into())
        );

        let path = RelativePath::parse("Definitions/Items/Potions/potion.json").unwrap();
        assert_eq!(
            resolved_type(c.convention_tier(&path, &segments(&path))),
            Some("Items".into())
        );

        let path = RelativePath::parse("Definitions/loose.json").unwrap();
        assert_eq!(c.convention_tier(&path, &segments(&path)), TierOutcome::Inconclusive);

        let path = RelativePath::parse("Other/Weather/rain.json").unwrap();
        assert_eq!(c.convention_tier(&path, &segments(&path)), TierOutcome::Inconclusive);
    }

    #[test]
    fn test_content_folder_hint() {
        let manifest = PackageManifest::new("p").with_content_folder("Sounds", "Audio");
        let c = classifier(&manifest, &[]);
        let path = RelativePath::parse("Sounds/Effects/door.json").unwrap();
        assert_eq!(
            resolved_type(c.content_folder_tier(&segments(&path))),
            Some("Audio".into())
        );
        let path = RelativePath::parse("Other/door.json").unwrap();
        assert_eq!(c.content_folder_tier(&segments(&path)), TierOutcome::Inconclusive);
    }

    #[test]
    fn test_builtin_skips_invalid_rules() {
        let table = MappingTable::builtin(&[
            MappingRule::new("../escape", "X"),
            MappingRule::new("Definitions/Ok", "Ok"),
            MappingRule::new("Definitions/Blank", " "),
        ]);
        assert_eq!(table.len(), 1);
    }
}
