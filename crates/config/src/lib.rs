//! Configuration loading, env substitution, overrides, and validation.
//!
//! Config files: `motifini.toml`, `motifini.yaml`, `motifini.yml`, or
//! `motifini.json`, searched in `./` then the user config directory.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, data_dir, discover_and_load, load, load_config},
    schema::{ConsoleConfig, MotifiniConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
