//! Error taxonomy for a discovery pass.
//!
//! Errors come in three scopes:
//!
//! - [`FileError`]: one definition file failed. The file is skipped; the
//!   rest of its package still loads.
//! - [`PackageError`]: a whole package's contribution is dropped. Sibling
//!   packages still load.
//! - [`LoadError`]: the pass cannot produce a registry at all.

use std::fmt;
use std::path::PathBuf;

use crate::events::ObserverError;
use crate::inference::Tier;
use crate::manifest::ManifestError;
use crate::path::RelativePath;
use crate::types::DefinitionType;

/// One of the types competing for a file in an ambiguous classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCandidate {
    pub type_name: DefinitionType,
    /// Where the claim came from, e.g. `package mapping "Data/Audio"`.
    pub origin: String,
}

impl fmt::Display for TypeCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (from {})", self.type_name, self.origin)
    }
}

/// The inference engine's structured failure. Never a placeholder type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassificationError {
    #[error("no tier could classify {path} (attempted: {})", join(.attempted))]
    UnresolvedType {
        path: RelativePath,
        attempted: Vec<Tier>,
    },

    #[error("ambiguous type for {path} at the {tier} tier: {}", join(.candidates))]
    AmbiguousType {
        path: RelativePath,
        tier: Tier,
        candidates: Vec<TypeCandidate>,
    },
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a single definition file was skipped.
#[derive(Debug, thiserror::Error)]
pub enum FileErrorKind {
    #[error("unresolved type (attempted: {})", join(.attempted))]
    UnresolvedType { attempted: Vec<Tier> },

    #[error("ambiguous type at the {tier} tier: {}", join(.candidates))]
    AmbiguousType {
        tier: Tier,
        candidates: Vec<TypeCandidate>,
    },

    #[error("malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("missing identifier field {field:?}")]
    MissingIdentifier { field: String },

    #[error("identifier {id:?} is not of the form namespace:type:category/name")]
    InvalidIdentifier { id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ClassificationError> for FileErrorKind {
    fn from(err: ClassificationError) -> Self {
        match err {
            ClassificationError::UnresolvedType { attempted, .. } => {
                FileErrorKind::UnresolvedType { attempted }
            }
            ClassificationError::AmbiguousType {
                tier, candidates, ..
            } => FileErrorKind::AmbiguousType { tier, candidates },
        }
    }
}

/// A per-file failure, tagged with where it happened.
#[derive(Debug, thiserror::Error)]
#[error("{package}: {path}: {kind}")]
pub struct FileError {
    pub package: String,
    pub path: RelativePath,
    pub kind: FileErrorKind,
}

/// Raised by the registry when a package registers the same id twice in one
/// pass without the explicit override flag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("package {package} declares {id} twice ({first} and {second})")]
pub struct DuplicateIdError {
    pub package: String,
    pub id: String,
    pub first: RelativePath,
    pub second: RelativePath,
}

/// A failure that drops one package's whole contribution.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error(transparent)]
    DuplicateId(#[from] DuplicateIdError),

    #[error("package {package} depends on {dependency}, which was not loaded")]
    UnresolvedDependency { package: String, dependency: String },

    #[error("package manifest in {}: {error}", .dir.display())]
    Manifest {
        dir: PathBuf,
        #[source]
        error: ManifestError,
    },
}

impl PackageError {
    /// The package id, when one is known.
    pub fn package(&self) -> Option<&str> {
        match self {
            PackageError::DuplicateId(e) => Some(&e.package),
            PackageError::UnresolvedDependency { package, .. } => Some(package),
            PackageError::Manifest { .. } => None,
        }
    }
}

/// A failure that aborts the whole load pass.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("dependency cycle: {}", .packages.join(" -> "))]
    CyclicDependency { packages: Vec<String> },

    #[error("package id {id} is declared by both {} and {}", .first.display(), .second.display())]
    DuplicatePackage {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("discovery observer failed: {0}")]
    Observer(#[from] ObserverError),

    #[error("failed to list packages: {0}")]
    Io(#[from] std::io::Error),

    #[error("load aborted: {0}")]
    Aborted(#[source] LoadFailure),
}

/// A recoverable failure that the strict policy promoted to fatal.
#[derive(Debug, thiserror::Error)]
pub enum LoadFailure {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Package(#[from] PackageError),
}
