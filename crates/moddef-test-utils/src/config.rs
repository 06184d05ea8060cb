//! Configuration builders for tests.

use moddef_config::{ExplicitTagMode, FailurePolicy, LoaderConfig, MappingRule};

/// Fluent builder for [`LoaderConfig`] in tests.
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .strict()
///     .mapping("Definitions/Cutscenes", "Cutscene")
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: LoaderConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: LoaderConfig::default(),
        }
    }

    pub fn strict(mut self) -> Self {
        self.config.discovery.failure_policy = FailurePolicy::Strict;
        self
    }

    pub fn explicit_tags(mut self, mode: ExplicitTagMode) -> Self {
        self.config.discovery.explicit_tags = mode;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.discovery.parallel = parallel;
        self
    }

    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.config.discovery.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn require_namespaced_ids(mut self) -> Self {
        self.config.discovery.require_namespaced_ids = true;
        self
    }

    pub fn mapping(mut self, prefix: &str, type_name: &str) -> Self {
        self.config.mappings.push(MappingRule::new(prefix, type_name));
        self
    }

    pub fn build(self) -> LoaderConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
