//! Package scanner: enumerate, classify, and read one package's files.
//!
//! The scanner only reports what it found. It never touches the registry;
//! conflict resolution is the loader's job.
//!
//! Files of a package are independent of each other, so classification may
//! run on the rayon pool. Results always come back in path order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use moddef_config::LoaderConfig;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::classifier::{MappingTable, PathClassifier};
use crate::error::{FileError, FileErrorKind};
use crate::inference::{InferenceEngine, Tier};
use crate::manifest::Package;
use crate::metadata::{DocumentFormat, MetadataReader};
use crate::path::{PrefixSegments, RelativePath};
use crate::types::{DefinitionId, DefinitionType};

/// A file found under one of a package's content roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub package: String,
    pub absolute: PathBuf,
    pub relative: RelativePath,
    pub format: DocumentFormat,
}

/// A classified definition file, ready to become a registry record.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredDefinition {
    pub id: String,
    pub type_name: DefinitionType,
    pub tier: Tier,
    pub package: String,
    pub path: RelativePath,
    pub absolute_path: PathBuf,
    pub payload: Value,
    /// The file opted in to replacing a record its own package registered
    /// earlier in the same pass.
    pub explicit_override: bool,
}

/// Everything one package scan produced, in path order.
#[derive(Debug)]
pub struct PackageScan {
    pub package: String,
    pub results: Vec<Result<DiscoveredDefinition, FileError>>,
}

impl PackageScan {
    pub fn definitions(&self) -> impl Iterator<Item = &DiscoveredDefinition> {
        self.results.iter().filter_map(|r| r.as_ref().ok())
    }

    pub fn errors(&self) -> impl Iterator<Item = &FileError> {
        self.results.iter().filter_map(|r| r.as_ref().err())
    }
}

/// Scans packages with a shared configuration and built-in mapping table.
#[derive(Debug)]
pub struct PackageScanner<'a> {
    config: &'a LoaderConfig,
    builtin: &'a MappingTable,
    definitions_root: &'a PrefixSegments,
}

impl<'a> PackageScanner<'a> {
    pub fn new(
        config: &'a LoaderConfig,
        builtin: &'a MappingTable,
        definitions_root: &'a PrefixSegments,
    ) -> Self {
        Self {
            config,
            builtin,
            definitions_root,
        }
    }

    /// The content roots of a package: the definitions root plus every
    /// declared content folder. Package-relative, deduplicated.
    pub fn content_roots(&self, package: &Package) -> Vec<RelativePath> {
        let mut roots: Vec<RelativePath> = std::iter::once(&self.config.discovery.definitions_root)
            .chain(package.manifest.content_folders.keys())
            .filter_map(|root| RelativePath::parse(root))
            .collect();
        roots.sort();
        roots.dedup_by(|a, b| a.lowered_segments().eq(b.lowered_segments()));
        roots
    }

    /// Enumerate the candidate files of a package, sorted by path.
    ///
    /// Files reachable from two overlapping roots are listed once. Hidden
    /// files and directories, and files outside the extension allow-list,
    /// are skipped. Root directories are matched case-insensitively.
    pub fn enumerate(&self, package: &Package) -> (Vec<CandidateFile>, Vec<FileError>) {
        let mut found: BTreeMap<RelativePath, CandidateFile> = BTreeMap::new();
        let mut errors = Vec::new();

        for root in self.content_roots(package) {
            let Some(root_abs) = resolve_dir(&package.root, &root) else {
                debug!(package = %package.id(), root = %root, "Content root missing, skipping");
                continue;
            };

            let walker = WalkDir::new(&root_abs)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        let path = err
                            .path()
                            .and_then(|p| RelativePath::from_root(&package.root, p))
                            .unwrap_or_else(|| root.clone());
                        errors.push(FileError {
                            package: package.id().to_string(),
                            path,
                            kind: FileErrorKind::Io(err.into()),
                        });
                        continue;
                    }
                };
                if !entry.file_type().is_file() || is_hidden(entry.file_name()) {
                    continue;
                }
                let Some(relative) = RelativePath::from_root(&package.root, entry.path()) else {
                    continue;
                };
                let Some(format) = relative
                    .extension()
                    .filter(|ext| self.config.accepts_extension(ext))
                    .and_then(DocumentFormat::from_extension)
                else {
                    continue;
                };
                found.entry(relative.clone()).or_insert_with(|| CandidateFile {
                    package: package.id().to_string(),
                    absolute: entry.path().to_path_buf(),
                    relative,
                    format,
                });
            }
        }

        (found.into_values().collect(), errors)
    }

    /// Enumerate and classify every file of a package.
    pub fn scan(&self, package: &Package) -> PackageScan {
        let classifier = PathClassifier::for_package(self.builtin, self.definitions_root, &package.manifest);
        let engine = InferenceEngine::new(
            &classifier,
            &self.config.discovery.type_field,
            self.config.discovery.explicit_tags,
        );

        let (candidates, walk_errors) = self.enumerate(package);

        let discovered: Vec<Result<DiscoveredDefinition, FileError>> = if self.config.discovery.parallel {
            candidates.par_iter().map(|c| self.discover(&engine, c)).collect()
        } else {
            candidates.iter().map(|c| self.discover(&engine, c)).collect()
        };

        let results = merge_in_path_order(discovered, walk_errors);

        info!(
            package = %package.id(),
            files = candidates.len(),
            errors = results.iter().filter(|r| r.is_err()).count(),
            "Scanned package"
        );

        PackageScan {
            package: package.id().to_string(),
            results,
        }
    }

    fn discover(
        &self,
        engine: &InferenceEngine<'_>,
        candidate: &CandidateFile,
    ) -> Result<DiscoveredDefinition, FileError> {
        self.discover_inner(engine, candidate).map_err(|kind| FileError {
            package: candidate.package.clone(),
            path: candidate.relative.clone(),
            kind,
        })
    }

    fn discover_inner(
        &self,
        engine: &InferenceEngine<'_>,
        candidate: &CandidateFile,
    ) -> Result<DiscoveredDefinition, FileErrorKind> {
        let discovery = &self.config.discovery;
        let mut reader = MetadataReader::new(&candidate.absolute, candidate.format);

        let classification = engine.classify(&candidate.relative, &mut reader)?;
        let id = reader.identifier(&discovery.id_field)?;
        if discovery.require_namespaced_ids && !DefinitionId::is_valid(&id) {
            return Err(FileErrorKind::InvalidIdentifier { id });
        }
        let explicit_override = reader.override_flag(&discovery.override_field)?;

        debug!(
            package = %candidate.package,
            path = %candidate.relative,
            %id,
            r#type = %classification.type_name,
            tier = %classification.tier,
            "Classified definition"
        );

        Ok(DiscoveredDefinition {
            id,
            type_name: classification.type_name,
            tier: classification.tier,
            package: candidate.package.clone(),
            path: candidate.relative.clone(),
            absolute_path: candidate.absolute.clone(),
            payload: reader.into_payload()?,
            explicit_override,
        })
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

/// Fold walk errors into the path-ordered results. The sort is stable, so
/// an error on a directory lands before the files beneath it.
fn merge_in_path_order(
    mut results: Vec<Result<DiscoveredDefinition, FileError>>,
    walk_errors: Vec<FileError>,
) -> Vec<Result<DiscoveredDefinition, FileError>> {
    if walk_errors.is_empty() {
        return results;
    }
    results.extend(walk_errors.into_iter().map(Err));
    results.sort_by(|a, b| result_path(a).cmp(result_path(b)));
    results
}

fn result_path(result: &Result<DiscoveredDefinition, FileError>) -> &RelativePath {
    match result {
        Ok(definition) => &definition.path,
        Err(error) => &error.path,
    }
}

/// Find the directory for `relative` under `root`, matching each segment
/// exactly first and then ignoring ASCII case.
fn resolve_dir(root: &Path, relative: &RelativePath) -> Option<PathBuf> {
    let mut dir = root.to_path_buf();
    for segment in relative.segments() {
        let exact = dir.join(segment);
        if exact.is_dir() {
            dir = exact;
            continue;
        }
        let mut matches: Vec<PathBuf> = std::fs::read_dir(&dir)
            .ok()?
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_str().is_some_and(|n| n.eq_ignore_ascii_case(segment)))
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        matches.sort();
        if matches.len() > 1 {
            warn!(
                dir = %dir.display(),
                %segment,
                chosen = %matches[0].display(),
                "Several directories differ only in case"
            );
        }
        dir = matches.into_iter().next()?;
    }
    Some(dir)
}
