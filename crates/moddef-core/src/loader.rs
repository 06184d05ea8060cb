//! Load pass orchestration.
//!
//! ```text
//! mods dir ─► manifests ─► resolver ─► for each package in order:
//!                                        scanner ─► duplicate check ─► registry ─► events
//!                                      ─► seal
//! ```
//!
//! Packages are ingested strictly one after another. Only classification
//! inside a single package may run in parallel.

use std::collections::BTreeMap;
use std::path::Path;

use moddef_config::{ConfigError, FailurePolicy, LoaderConfig};
use serde::Serialize;
use tracing::{info, warn};

use crate::classifier::MappingTable;
use crate::error::{FileError, LoadError, LoadFailure, PackageError};
use crate::events::EventChannel;
use crate::manifest::{Package, discover_packages};
use crate::path::PrefixSegments;
use crate::registry::{Registry, RegistryBuilder, find_duplicate};
use crate::resolver;
use crate::scanner::PackageScanner;

/// What happened to one package during a pass.
#[derive(Debug, Default)]
pub struct PackageReport {
    pub package: String,
    /// Records newly registered by this package.
    pub registered: usize,
    /// Records from earlier packages (or itself) this package replaced.
    pub overridden: usize,
    /// Files that were skipped.
    pub file_errors: Vec<FileError>,
    /// Set when the package's whole contribution was dropped.
    pub error: Option<PackageError>,
}

impl PackageReport {
    fn new(package: &str) -> Self {
        Self {
            package: package.to_string(),
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.file_errors.is_empty() && self.error.is_none()
    }
}

/// Errors grouped by package, plus the resolved order.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Packages that were scanned, in load order.
    pub load_order: Vec<String>,
    /// One entry per package with a known id: loaded packages in load
    /// order, then rejected ones.
    pub packages: Vec<PackageReport>,
    /// Package directories whose manifest could not be read.
    pub manifest_errors: Vec<PackageError>,
}

impl LoadReport {
    pub fn package(&self, id: &str) -> Option<&PackageReport> {
        self.packages.iter().find(|p| p.package == id)
    }

    pub fn error_count(&self) -> usize {
        self.manifest_errors.len()
            + self
                .packages
                .iter()
                .map(|p| p.file_errors.len() + usize::from(p.error.is_some()))
                .sum::<usize>()
    }

    pub fn is_clean(&self) -> bool {
        self.error_count() == 0
    }

    /// Aggregate counts for display.
    pub fn summary(&self) -> LoadSummary {
        LoadSummary {
            packages: self.load_order.len(),
            rejected_packages: self.packages.iter().filter(|p| p.error.is_some()).count()
                + self.manifest_errors.len(),
            registered: self.packages.iter().map(|p| p.registered).sum(),
            overridden: self.packages.iter().map(|p| p.overridden).sum(),
            errors: self.error_count(),
        }
    }
}

/// Counts over a whole pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub packages: usize,
    pub rejected_packages: usize,
    pub registered: usize,
    pub overridden: usize,
    pub errors: usize,
}

/// A sealed registry and the report of the pass that built it.
#[derive(Debug)]
pub struct LoadOutcome {
    pub registry: Registry,
    pub report: LoadReport,
}

/// Runs load passes with one configuration.
#[derive(Debug, Clone)]
pub struct DefinitionLoader {
    config: LoaderConfig,
    builtin: MappingTable,
    definitions_root: PrefixSegments,
}

impl DefinitionLoader {
    pub fn new(config: LoaderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let definitions_root = PrefixSegments::parse(&config.discovery.definitions_root)
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "discovery.definitions_root {:?} is not a relative path",
                    config.discovery.definitions_root
                ))
            })?;
        let builtin = MappingTable::for_config(&config);
        Ok(Self {
            config,
            builtin,
            definitions_root,
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn strict(&self) -> bool {
        self.config.discovery.failure_policy == FailurePolicy::Strict
    }

    /// Discover every package under `mods_dir` and load them.
    pub fn load_dir(&self, mods_dir: &Path, events: &mut EventChannel) -> Result<LoadOutcome, LoadError> {
        let listing = discover_packages(mods_dir, &self.config.discovery.manifest_file)?;
        info!(
            mods_dir = %mods_dir.display(),
            packages = listing.packages.len(),
            broken = listing.broken.len(),
            "Listed packages"
        );

        let mut manifest_errors = Vec::with_capacity(listing.broken.len());
        for broken in listing.broken {
            let error = PackageError::Manifest {
                dir: broken.dir,
                error: broken.error,
            };
            warn!(%error, "Skipping package");
            if self.strict() {
                return Err(LoadError::Aborted(error.into()));
            }
            manifest_errors.push(error);
        }

        let mut outcome = self.load(listing.packages, events)?;
        outcome.report.manifest_errors = manifest_errors;
        Ok(outcome)
    }

    /// Load an explicit set of packages.
    pub fn load(&self, packages: Vec<Package>, events: &mut EventChannel) -> Result<LoadOutcome, LoadError> {
        let mut by_id: BTreeMap<String, Package> = BTreeMap::new();
        for package in packages {
            if let Some(first) = by_id.get(package.id()) {
                return Err(LoadError::DuplicatePackage {
                    id: package.id().to_string(),
                    first: first.root.clone(),
                    second: package.root,
                });
            }
            by_id.insert(package.id().to_string(), package);
        }

        let plan = resolver::resolve(by_id.values().map(|p| &p.manifest))?;
        info!(order = ?plan.order, "Resolved load order");

        let mut report = LoadReport {
            load_order: plan.order.clone(),
            ..LoadReport::default()
        };
        let mut rejected = Vec::with_capacity(plan.rejected.len());
        for error in plan.rejected {
            if self.strict() {
                return Err(LoadError::Aborted(error.into()));
            }
            let mut package_report = PackageReport::new(error.package().unwrap_or_default());
            package_report.error = Some(error);
            rejected.push(package_report);
        }

        let scanner = PackageScanner::new(&self.config, &self.builtin, &self.definitions_root);
        let mut builder = RegistryBuilder::new();

        for id in &plan.order {
            let Some(package) = by_id.get(id) else {
                continue;
            };
            let package_report = self.load_package(package, &scanner, &mut builder, events)?;
            report.packages.push(package_report);
        }
        report.packages.extend(rejected);

        let registry = builder.seal();
        let summary = report.summary();
        info!(
            packages = summary.packages,
            definitions = registry.len(),
            overridden = summary.overridden,
            errors = summary.errors,
            "Load pass complete"
        );

        Ok(LoadOutcome { registry, report })
    }

    fn load_package(
        &self,
        package: &Package,
        scanner: &PackageScanner<'_>,
        builder: &mut RegistryBuilder,
        events: &mut EventChannel,
    ) -> Result<PackageReport, LoadError> {
        let mut report = PackageReport::new(package.id());
        let scan = scanner.scan(package);

        let mut definitions = Vec::with_capacity(scan.results.len());
        for result in scan.results {
            match result {
                Ok(definition) => definitions.push(definition),
                Err(error) => {
                    warn!(%error, "Skipping definition file");
                    if self.strict() {
                        return Err(LoadError::Aborted(LoadFailure::File(error)));
                    }
                    report.file_errors.push(error);
                }
            }
        }

        if let Some(duplicate) = find_duplicate(&definitions) {
            warn!(%duplicate, "Dropping package contribution");
            let error = PackageError::DuplicateId(duplicate);
            if self.strict() {
                return Err(LoadError::Aborted(error.into()));
            }
            report.error = Some(error);
            return Ok(report);
        }

        builder.begin_package(package.id());
        for definition in definitions {
            let event = match builder.ingest(definition) {
                Ok(event) => event,
                Err(duplicate) => {
                    let error = PackageError::DuplicateId(duplicate);
                    if self.strict() {
                        return Err(LoadError::Aborted(error.into()));
                    }
                    report.error = Some(error);
                    break;
                }
            };
            if event.is_override() {
                report.overridden += 1;
            } else {
                report.registered += 1;
            }
            events.publish(&event)?;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventRecorder;
    use crate::manifest::PackageManifest;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn loader() -> DefinitionLoader {
        DefinitionLoader::new(LoaderConfig::default()).unwrap()
    }

    #[test]
    fn test_duplicate_package_id_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let packages = vec![
            Package::new(PackageManifest::new("base"), tmp.path().join("one")),
            Package::new(PackageManifest::new("base"), tmp.path().join("two")),
        ];
        let err = loader().load(packages, &mut EventChannel::new()).unwrap_err();
        assert!(matches!(err, LoadError::DuplicatePackage { ref id, .. } if id == "base"));
    }

    #[test]
    fn test_load_reports_per_package() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("base");
        write(&base, "Definitions/Weather/rain.json", r#"{ "id": "rain" }"#);
        write(&base, "Definitions/Weather/bad.json", "{");
        let patch = tmp.path().join("patch");
        write(&patch, "Definitions/Weather/rain.json", r#"{ "id": "rain", "wet": true }"#);

        let packages = vec![
            Package::new(PackageManifest::new("patch").with_dependency("base"), &patch),
            Package::new(PackageManifest::new("base"), &base),
        ];
        let recorder = EventRecorder::new();
        let reader = recorder.reader();
        let mut events = EventChannel::new().with(recorder);

        let outcome = loader().load(packages, &mut events).unwrap();
        assert_eq!(outcome.report.load_order, vec!["base", "patch"]);
        assert_eq!(outcome.report.package("base").unwrap().file_errors.len(), 1);
        assert_eq!(outcome.report.package("patch").unwrap().overridden, 1);
        assert_eq!(
            outcome.report.summary(),
            LoadSummary {
                packages: 2,
                rejected_packages: 0,
                registered: 1,
                overridden: 1,
                errors: 1
            }
        );
        assert_eq!(reader.len(), 2);
        assert_eq!(outcome.registry.get("rain").unwrap().source_package, "patch");
    }

    #[test]
    fn test_strict_policy_aborts_on_file_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "Misc/x.json", r#"{ "id": "x" }"#);
        write(tmp.path(), "Definitions/x.json", r#"{ "id": "x" }"#);

        let mut config = LoaderConfig::default();
        config.discovery.failure_policy = FailurePolicy::Strict;
        let loader = DefinitionLoader::new(config).unwrap();

        let packages = vec![Package::new(PackageManifest::new("p"), tmp.path())];
        let err = loader.load(packages, &mut EventChannel::new()).unwrap_err();
        assert!(matches!(err, LoadError::Aborted(LoadFailure::File(_))));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = LoaderConfig::default();
        config.discovery.definitions_root = "../escape".to_string();
        assert!(matches!(
            DefinitionLoader::new(config),
            Err(ConfigError::Validation(_))
        ));
    }
}
