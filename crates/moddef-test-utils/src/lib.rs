#![deny(unsafe_code)]

//! Shared test utilities for the moddef workspace.
//!
//! Provides a temp-dir mod tree builder, a loader config builder, and
//! tracing helpers so that individual crate tests stay concise.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! moddef-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod mods;
pub mod tracing_setup;

pub use config::TestConfigBuilder;
pub use mods::TestModTree;
