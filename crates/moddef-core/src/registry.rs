//! Definition registry.
//!
//! Records live in an arena. The current record for each id is an index into
//! it, and each record's `overrides` field is the index of the record it
//! replaced, so the override chain is a walk over indices, newest first.
//!
//! A [`RegistryBuilder`] is open for one load pass and turns into an
//! immutable [`Registry`] with [`RegistryBuilder::seal`]. There is no way
//! back: a reload builds a new registry.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

use crate::error::DuplicateIdError;
use crate::events::DiscoveryEvent;
use crate::inference::Tier;
use crate::path::RelativePath;
use crate::scanner::DiscoveredDefinition;
use crate::types::DefinitionType;

/// Position of a record in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordIndex(usize);

impl RecordIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

/// One stored definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefinitionRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: DefinitionType,
    pub source_package: String,
    pub source_path: RelativePath,
    pub tier: Tier,
    /// The raw document. Type-specific consumers deserialize it themselves.
    pub payload: Value,
    /// The record this one replaced, if any.
    pub overrides: Option<RecordIndex>,
    #[serde(skip)]
    package_position: usize,
}

impl DefinitionRecord {
    /// Position of the source package in the load order.
    pub fn package_position(&self) -> usize {
        self.package_position
    }
}

/// Find the first id a package declares twice without the override flag.
///
/// Run before ingesting a package so a duplicate drops its whole
/// contribution rather than half of it.
pub fn find_duplicate(definitions: &[DiscoveredDefinition]) -> Option<DuplicateIdError> {
    let mut seen: HashMap<&str, &RelativePath> = HashMap::new();
    for def in definitions {
        match seen.get(def.id.as_str()) {
            Some(first) if !def.explicit_override => {
                return Some(DuplicateIdError {
                    package: def.package.clone(),
                    id: def.id.clone(),
                    first: (*first).clone(),
                    second: def.path.clone(),
                });
            }
            _ => {
                seen.insert(&def.id, &def.path);
            }
        }
    }
    None
}

/// The open registry of a load pass.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    records: Vec<DefinitionRecord>,
    current: BTreeMap<String, RecordIndex>,
    load_order: Vec<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a package to the load order. Ingesting a definition from a
    /// package that was never begun begins it implicitly.
    pub fn begin_package(&mut self, package: &str) -> usize {
        match self.position_of(package) {
            Some(position) => position,
            None => {
                self.load_order.push(package.to_string());
                self.load_order.len() - 1
            }
        }
    }

    fn position_of(&self, package: &str) -> Option<usize> {
        self.load_order.iter().rposition(|p| p == package)
    }

    /// Store a definition, replacing any current record with the same id.
    ///
    /// A package may only replace its own earlier record when the new file
    /// sets the explicit override flag.
    pub fn ingest(&mut self, def: DiscoveredDefinition) -> Result<DiscoveryEvent, DuplicateIdError> {
        let package_position = self.begin_package(&def.package);
        let previous = self.current.get(&def.id).copied();

        if let Some(index) = previous {
            let existing = &self.records[index.0];
            if existing.source_package == def.package && !def.explicit_override {
                return Err(DuplicateIdError {
                    package: def.package,
                    id: def.id,
                    first: existing.source_path.clone(),
                    second: def.path,
                });
            }
        }

        let event = match previous {
            None => DiscoveryEvent::Registered {
                id: def.id.clone(),
                type_name: def.type_name.clone(),
                package: def.package.clone(),
            },
            Some(index) => DiscoveryEvent::Overridden {
                id: def.id.clone(),
                type_name: def.type_name.clone(),
                package: def.package.clone(),
                previous_package: self.records[index.0].source_package.clone(),
            },
        };

        let index = RecordIndex(self.records.len());
        self.current.insert(def.id.clone(), index);
        self.records.push(DefinitionRecord {
            id: def.id,
            type_name: def.type_name,
            source_package: def.package,
            source_path: def.path,
            tier: def.tier,
            payload: def.payload,
            overrides: previous,
            package_position,
        });

        Ok(event)
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Close the registry for writing.
    pub fn seal(self) -> Registry {
        let mut by_type: BTreeMap<DefinitionType, Vec<RecordIndex>> = BTreeMap::new();
        for &index in self.current.values() {
            by_type
                .entry(self.records[index.0].type_name.clone())
                .or_default()
                .push(index);
        }
        // `current` iterates in id order, so a stable sort by package
        // position leaves ids sorted within each package.
        for indices in by_type.values_mut() {
            indices.sort_by_key(|index| self.records[index.0].package_position);
        }

        Registry {
            records: self.records,
            current: self.current,
            load_order: self.load_order,
            by_type,
        }
    }
}

/// A sealed, read-only registry snapshot.
///
/// Serializes to the same bytes for the same load pass input.
#[derive(Debug, Default, Serialize)]
pub struct Registry {
    load_order: Vec<String>,
    current: BTreeMap<String, RecordIndex>,
    records: Vec<DefinitionRecord>,
    #[serde(skip)]
    by_type: BTreeMap<DefinitionType, Vec<RecordIndex>>,
}

impl Registry {
    /// The current record for `id`.
    pub fn get(&self, id: &str) -> Option<&DefinitionRecord> {
        self.current.get(id).map(|index| &self.records[index.0])
    }

    /// Current records of one type, by package load order, then id.
    pub fn all_of_type<'a>(&'a self, type_name: &str) -> impl Iterator<Item = &'a DefinitionRecord> + 'a {
        self.by_type
            .get(type_name)
            .into_iter()
            .flatten()
            .map(|index| &self.records[index.0])
    }

    pub fn type_of(&self, id: &str) -> Option<&DefinitionType> {
        self.get(id).map(|record| &record.type_name)
    }

    /// The current record for `id` followed by every record it replaced,
    /// newest first. Empty when `id` is unknown.
    pub fn override_chain(&self, id: &str) -> OverrideChain<'_> {
        OverrideChain {
            registry: self,
            next: self.current.get(id).copied(),
        }
    }

    /// Every type with at least one current record, sorted.
    pub fn types(&self) -> impl Iterator<Item = &DefinitionType> {
        self.by_type.keys()
    }

    /// Current ids, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.current.keys().map(String::as_str)
    }

    /// Packages that contributed to this pass, in load order.
    pub fn load_order(&self) -> &[String] {
        &self.load_order
    }

    pub fn record(&self, index: RecordIndex) -> Option<&DefinitionRecord> {
        self.records.get(index.0)
    }

    /// Number of current records.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Number of stored records, including superseded ones.
    pub fn history_len(&self) -> usize {
        self.records.len()
    }
}

/// Iterator over an override chain.
#[derive(Debug, Clone)]
pub struct OverrideChain<'a> {
    registry: &'a Registry,
    next: Option<RecordIndex>,
}

impl<'a> Iterator for OverrideChain<'a> {
    type Item = &'a DefinitionRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.registry.record(self.next?)?;
        self.next = record.overrides;
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn def(package: &str, path: &str, id: &str, type_name: &str) -> DiscoveredDefinition {
        DiscoveredDefinition {
            id: id.to_string(),
            type_name: DefinitionType::from(type_name),
            tier: Tier::DirectoryConvention,
            package: package.to_string(),
            path: RelativePath::parse(path).unwrap(),
            absolute_path: path.into(),
            payload: json!({ "id": id }),
            explicit_override: false,
        }
    }

    #[test]
    fn test_register_then_override() {
        let mut builder = RegistryBuilder::new();
        let first = builder.ingest(def("base", "Definitions/Audio/a.json", "x", "Audio")).unwrap();
        assert_eq!(
            first,
            DiscoveryEvent::Registered {
                id: "x".into(),
                type_name: "Audio".into(),
                package: "base".into()
            }
        );

        let second = builder.ingest(def("patch", "Definitions/Audio/a.json", "x", "Audio")).unwrap();
        assert_eq!(
            second,
            DiscoveryEvent::Overridden {
                id: "x".into(),
                type_name: "Audio".into(),
                package: "patch".into(),
                previous_package: "base".into()
            }
        );

        let registry = builder.seal();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.history_len(), 2);
        assert_eq!(registry.get("x").unwrap().source_package, "patch");
        let chain: Vec<&str> = registry
            .override_chain("x")
            .map(|r| r.source_package.as_str())
            .collect();
        assert_eq!(chain, vec!["patch", "base"]);
    }

    #[test]
    fn test_same_package_duplicate_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.ingest(def("base", "Definitions/A/one.json", "x", "A")).unwrap();
        let err = builder.ingest(def("base", "Definitions/A/two.json", "x", "A")).unwrap_err();
        assert_eq!(err.first.as_str(), "Definitions/A/one.json");
        assert_eq!(err.second.as_str(), "Definitions/A/two.json");

        let registry = builder.seal();
        assert_eq!(registry.get("x").unwrap().source_path.as_str(), "Definitions/A/one.json");
    }

    #[test]
    fn test_explicit_flag_allows_self_override() {
        let mut builder = RegistryBuilder::new();
        builder.ingest(def("base", "Definitions/A/one.json", "x", "A")).unwrap();
        let mut replacement = def("base", "Definitions/A/two.json", "x", "A");
        replacement.explicit_override = true;
        let event = builder.ingest(replacement).unwrap();
        assert!(matches!(
            event,
            DiscoveryEvent::Overridden { ref previous_package, .. } if previous_package == "base"
        ));
    }

    #[test]
    fn test_all_of_type_orders_by_package_then_id() {
        let mut builder = RegistryBuilder::new();
        builder.begin_package("base");
        builder.begin_package("extra");
        builder.ingest(def("extra", "Definitions/A/a.json", "a", "A")).unwrap();
        builder.ingest(def("base", "Definitions/A/z.json", "z", "A")).unwrap();
        builder.ingest(def("base", "Definitions/A/m.json", "m", "A")).unwrap();
        builder.ingest(def("base", "Definitions/B/b.json", "b", "B")).unwrap();

        let registry = builder.seal();
        let ids: Vec<&str> = registry.all_of_type("A").map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m", "z", "a"]);
        assert_eq!(registry.all_of_type("Missing").count(), 0);

        let types: Vec<&str> = registry.types().map(DefinitionType::as_str).collect();
        assert_eq!(types, vec!["A", "B"]);
        assert_eq!(registry.load_order(), ["base".to_string(), "extra".to_string()]);
    }

    #[test]
    fn test_override_can_change_type() {
        let mut builder = RegistryBuilder::new();
        builder.ingest(def("base", "Definitions/A/x.json", "x", "A")).unwrap();
        builder.ingest(def("patch", "Definitions/B/x.json", "x", "B")).unwrap();
        let registry = builder.seal();
        assert_eq!(registry.type_of("x").unwrap().as_str(), "B");
        assert_eq!(registry.all_of_type("A").count(), 0);
        assert_eq!(registry.all_of_type("B").count(), 1);
    }

    #[test]
    fn test_find_duplicate() {
        let defs = vec![
            def("p", "Definitions/A/1.json", "x", "A"),
            def("p", "Definitions/A/2.json", "y", "A"),
            def("p", "Definitions/A/3.json", "x", "A"),
        ];
        let dup = find_duplicate(&defs).unwrap();
        assert_eq!(dup.id, "x");
        assert_eq!(dup.second.as_str(), "Definitions/A/3.json");

        let mut allowed = defs.clone();
        allowed[2].explicit_override = true;
        assert!(find_duplicate(&allowed).is_none());
    }

    #[test]
    fn test_unknown_lookups() {
        let registry = RegistryBuilder::new().seal();
        assert!(registry.is_empty());
        assert!(registry.get("nope").is_none());
        assert!(registry.type_of("nope").is_none());
        assert_eq!(registry.override_chain("nope").count(), 0);
    }
}
