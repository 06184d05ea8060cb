//! Inference engine: runs the classification tiers in priority order.
//!
//! ```text
//! 1. explicit tag        (from the file's own document)
//! 2. path mapping        (built-in + package, longest prefix)
//! 3. directory convention (<definitions root>/<Type>/...)
//! 4. content folder      (package content-folder hints)
//! ```
//!
//! The path-based tiers (2-4) never touch the disk and are evaluated first.
//! The explicit tag is then read from the file's cached document, which the
//! caller needs anyway for the identifier, and wins whenever present.
//! Under [`ExplicitTagMode::Fallback`] the tag is only consulted when the
//! path-based tiers did not resolve.

use std::fmt;

use moddef_config::ExplicitTagMode;
use serde::{Deserialize, Serialize};

use crate::classifier::{PathClassifier, TierOutcome};
use crate::error::{ClassificationError, FileErrorKind, TypeCandidate};
use crate::metadata::MetadataReader;
use crate::path::RelativePath;
use crate::types::DefinitionType;

/// One strategy in the classification chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    ExplicitTag,
    PathMapping,
    DirectoryConvention,
    ContentFolder,
}

impl Tier {
    /// The tiers that only look at the path, in evaluation order.
    pub const PATH_BASED: [Tier; 3] = [
        Tier::PathMapping,
        Tier::DirectoryConvention,
        Tier::ContentFolder,
    ];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::ExplicitTag => write!(f, "explicit tag"),
            Tier::PathMapping => write!(f, "path mapping"),
            Tier::DirectoryConvention => write!(f, "directory convention"),
            Tier::ContentFolder => write!(f, "content folder"),
        }
    }
}

/// A resolved classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub type_name: DefinitionType,
    pub tier: Tier,
    pub origin: String,
}

/// Classifies files of one package.
#[derive(Debug, Clone, Copy)]
pub struct InferenceEngine<'a> {
    classifier: &'a PathClassifier,
    type_field: &'a str,
    tag_mode: ExplicitTagMode,
}

impl<'a> InferenceEngine<'a> {
    pub fn new(classifier: &'a PathClassifier, type_field: &'a str, tag_mode: ExplicitTagMode) -> Self {
        Self {
            classifier,
            type_field,
            tag_mode,
        }
    }

    /// Classify a file, reading its explicit tag through `reader` when needed.
    pub fn classify(
        &self,
        path: &RelativePath,
        reader: &mut MetadataReader,
    ) -> Result<Classification, FileErrorKind> {
        let mut attempted = Vec::with_capacity(Tier::PATH_BASED.len() + 1);
        let by_path = self.classify_path_tiers(path, &mut attempted);

        let consult_tag = match (self.tag_mode, &by_path) {
            (ExplicitTagMode::Always, _) => true,
            (ExplicitTagMode::Fallback, Ok(Some(_))) => false,
            (ExplicitTagMode::Fallback, _) => true,
        };
        if consult_tag {
            match self.tag_mode {
                ExplicitTagMode::Always => attempted.insert(0, Tier::ExplicitTag),
                ExplicitTagMode::Fallback => attempted.push(Tier::ExplicitTag),
            }
            if let Some(tag) = reader.type_tag(self.type_field)? {
                return Ok(Classification {
                    type_name: DefinitionType::new(tag),
                    tier: Tier::ExplicitTag,
                    origin: format!("field {:?}", self.type_field),
                });
            }
        }

        match by_path {
            Ok(Some(classification)) => Ok(classification),
            Ok(None) => Err(ClassificationError::UnresolvedType {
                path: path.clone(),
                attempted,
            }
            .into()),
            Err(err) => Err(err.into()),
        }
    }

    /// Classify using the path-based tiers only. No I/O.
    pub fn classify_path(&self, path: &RelativePath) -> Result<Classification, ClassificationError> {
        let mut attempted = Vec::with_capacity(Tier::PATH_BASED.len());
        match self.classify_path_tiers(path, &mut attempted)? {
            Some(classification) => Ok(classification),
            None => Err(ClassificationError::UnresolvedType {
                path: path.clone(),
                attempted,
            }),
        }
    }

    /// Evaluate the path tiers in order, stopping at the first one that is
    /// not inconclusive. An ambiguous tier is a hard failure; lower tiers do
    /// not get to break the tie.
    fn classify_path_tiers(
        &self,
        path: &RelativePath,
        attempted: &mut Vec<Tier>,
    ) -> Result<Option<Classification>, ClassificationError> {
        let segments: Vec<&str> = path.lowered_segments().collect();

        for tier in Tier::PATH_BASED {
            attempted.push(tier);
            let outcome = match tier {
                Tier::PathMapping => self.classifier.mapping_tier(&segments),
                Tier::DirectoryConvention => self.classifier.convention_tier(path, &segments),
                Tier::ContentFolder => self.classifier.content_folder_tier(&segments),
                Tier::ExplicitTag => TierOutcome::Inconclusive,
            };
            match outcome {
                TierOutcome::Inconclusive => continue,
                TierOutcome::Resolved(TypeCandidate { type_name, origin }) => {
                    return Ok(Some(Classification {
                        type_name,
                        tier,
                        origin,
                    }));
                }
                TierOutcome::Ambiguous(candidates) => {
                    return Err(ClassificationError::AmbiguousType {
                        path: path.clone(),
                        tier,
                        candidates,
                    });
                }
            }
        }

        Ok(None)
    }
}
