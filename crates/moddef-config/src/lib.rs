#![deny(unsafe_code)]

//! Configuration loading and validation for moddef.
//!
//! Loads TOML configuration files and validates them. Provides the
//! [`LoaderConfig`] type as the central configuration structure, and the
//! [`mappings`] module with the built-in path → type table.

/// Built-in path mappings and relative-path checks.
pub mod mappings;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use mappings::{MappingRule, builtin_mappings};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Extensions the metadata reader knows how to parse.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["json", "toml"];

/// Top-level loader configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Discovery pass settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Operator path mappings. They outrank [`builtin_mappings`] entries of
    /// the same prefix length.
    #[serde(default)]
    pub mappings: Vec<MappingRule>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// When the explicit type tag inside a definition is consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplicitTagMode {
    /// The tag is always read and always wins over path-based tiers.
    #[default]
    Always,
    /// The tag is only read when no path-based tier resolved the type.
    Fallback,
}

/// What a load pass does when a file or package fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the error in the load report and keep going.
    #[default]
    Continue,
    /// Abort the pass on the first error.
    Strict,
}

/// Settings for the discovery pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Manifest file name looked up in each package directory.
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,

    /// Reserved definitions root. Always scanned, and the root of the
    /// directory-convention tier.
    #[serde(default = "default_definitions_root")]
    pub definitions_root: String,

    /// Extension allow-list for definition files (without the dot).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Field holding the record identifier.
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Field holding an optional explicit type tag.
    #[serde(default = "default_type_field")]
    pub type_field: String,

    /// Field holding the explicit same-package override flag.
    #[serde(default = "default_override_field")]
    pub override_field: String,

    /// When the explicit type tag is consulted.
    #[serde(default)]
    pub explicit_tags: ExplicitTagMode,

    /// Behaviour on per-file and per-package errors.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Classify the files of one package on a worker pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Reject identifiers not shaped like `namespace:type:category/name`.
    #[serde(default)]
    pub require_namespaced_ids: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            manifest_file: default_manifest_file(),
            definitions_root: default_definitions_root(),
            extensions: default_extensions(),
            id_field: default_id_field(),
            type_field: default_type_field(),
            override_field: default_override_field(),
            explicit_tags: ExplicitTagMode::default(),
            failure_policy: FailurePolicy::default(),
            parallel: default_parallel(),
            require_namespaced_ids: false,
        }
    }
}

fn default_manifest_file() -> String {
    "mod.json".to_string()
}

fn default_definitions_root() -> String {
    "Definitions".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["json".to_string()]
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_type_field() -> String {
    "$type".to_string()
}

fn default_override_field() -> String {
    "$override".to_string()
}

fn default_parallel() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoaderConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        tracing::debug!(path = %path.display(), "Loaded loader config");
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: LoaderConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.discovery;

        if d.manifest_file.trim().is_empty() {
            return Err(ConfigError::Validation(
                "discovery.manifest_file must not be empty".to_string(),
            ));
        }
        mappings::check_relative_path(&d.definitions_root)
            .map_err(|e| ConfigError::Validation(format!("discovery.definitions_root: {e}")))?;

        for (name, value) in [
            ("id_field", &d.id_field),
            ("type_field", &d.type_field),
            ("override_field", &d.override_field),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "discovery.{name} must not be empty"
                )));
            }
        }
        if d.id_field == d.type_field || d.id_field == d.override_field {
            return Err(ConfigError::Validation(format!(
                "discovery.id_field {:?} must differ from type_field and override_field",
                d.id_field
            )));
        }

        if d.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "discovery.extensions must list at least one extension".to_string(),
            ));
        }
        for (i, ext) in d.extensions.iter().enumerate() {
            let normalized = ext.trim_start_matches('.').to_ascii_lowercase();
            if !SUPPORTED_EXTENSIONS.contains(&normalized.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "discovery.extensions[{i}] must be one of {SUPPORTED_EXTENSIONS:?}, got {ext:?}"
                )));
            }
        }

        for (i, rule) in self.mappings.iter().enumerate() {
            mappings::check_relative_path(&rule.prefix)
                .map_err(|e| ConfigError::Validation(format!("mappings[{i}].prefix: {e}")))?;
            if rule.type_name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "mappings[{i}].type must not be empty"
                )));
            }
        }

        Ok(())
    }

    /// Whether the given file extension (without the dot) is on the
    /// allow-list. Case-insensitive.
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.discovery
            .extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}
