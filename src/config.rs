//! Configuration
//!
//! Layered configuration for the directory and its logging, merged from
//! built-in defaults, an optional TOML file, and `CFGDESC_*` environment
//! variables (highest precedence, `__` separates nested keys, e.g.
//! `CFGDESC_DIRECTORY__NAME=edge`).

pub mod facade;
pub(crate) mod merge;
pub(crate) mod sources;

pub use facade::ConfigLoader;

use crate::directory::DirectorySettings;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "CFGDESC";

/// Held by tests that read or modify `CFGDESC_*` process environment.
#[cfg(test)]
pub(crate) static TEST_ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

/// Root configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CfgDescConfig {
    #[serde(default)]
    pub directory: DirectorySettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}
