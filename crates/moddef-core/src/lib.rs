#![deny(unsafe_code)]

//! moddef core: convention-based definition discovery for mod packages.
//!
//! A load pass orders packages by their dependencies, walks each package's
//! content roots, infers a semantic type for every definition file, and
//! assembles one conflict-resolved registry keyed by definition id.

/// Path-based classification tiers and the sorted mapping table.
pub mod classifier;
/// File, package, and pass-level error types.
pub mod error;
/// Discovery events and the per-pass observer channel.
pub mod events;
/// Atomic publication of sealed registries.
pub mod handle;
/// Tier orchestration.
pub mod inference;
/// Load pass orchestration and reports.
pub mod loader;
/// Package manifests and package discovery.
pub mod manifest;
/// Lazy, parse-once definition file reader.
pub mod metadata;
/// Normalized package-relative paths.
pub mod path;
/// The arena-backed definition registry.
pub mod registry;
/// Dependency ordering.
pub mod resolver;
/// Per-package file enumeration and classification.
pub mod scanner;
/// Shared value types.
pub mod types;

pub use error::{
    ClassificationError, DuplicateIdError, FileError, FileErrorKind, LoadError, LoadFailure,
    PackageError,
};
pub use events::{
    DiscoveryEvent, DiscoveryObserver, EventChannel, EventReader, EventRecorder, FnObserver,
    ObserverError, TracingObserver,
};
pub use handle::RegistryHandle;
pub use inference::{Classification, InferenceEngine, Tier};
pub use loader::{DefinitionLoader, LoadOutcome, LoadReport, LoadSummary, PackageReport};
pub use manifest::{Package, PackageManifest};
pub use registry::{DefinitionRecord, Registry, RegistryBuilder};
pub use types::{DefinitionId, DefinitionType};
