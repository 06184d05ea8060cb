//! Atomic publication of sealed registries.
//!
//! Readers call [`RegistryHandle::load`] and keep the returned `Arc` for as
//! long as they like. A rebuild never touches a published registry; it
//! builds a new one and swaps the pointer.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::error::LoadError;
use crate::events::EventChannel;
use crate::loader::{DefinitionLoader, LoadReport};
use crate::registry::Registry;

/// Shared pointer to the current registry snapshot.
pub struct RegistryHandle {
    current: ArcSwap<Registry>,
}

impl RegistryHandle {
    pub fn new(registry: Registry) -> Self {
        Self {
            current: ArcSwap::from_pointee(registry),
        }
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<Registry> {
        self.current.load_full()
    }

    /// Replace the current snapshot, returning the previous one.
    pub fn publish(&self, registry: Registry) -> Arc<Registry> {
        self.current.swap(Arc::new(registry))
    }

    /// Run a load pass and publish its registry.
    ///
    /// On failure the current snapshot stays in place and the error is
    /// returned.
    pub fn rebuild(
        &self,
        loader: &DefinitionLoader,
        mods_dir: &Path,
        events: &mut EventChannel,
    ) -> Result<LoadReport, LoadError> {
        match loader.load_dir(mods_dir, events) {
            Ok(outcome) => {
                info!(definitions = outcome.registry.len(), "Publishing rebuilt registry");
                self.publish(outcome.registry);
                Ok(outcome.report)
            }
            Err(error) => {
                warn!(%error, "Rebuild failed, keeping previous registry");
                Err(error)
            }
        }
    }
}

impl Default for RegistryHandle {
    fn default() -> Self {
        Self::new(Registry::default())
    }
}

impl fmt::Debug for RegistryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.load();
        f.debug_struct("RegistryHandle")
            .field("definitions", &current.len())
            .field("load_order", &current.load_order())
            .finish()
    }
}
