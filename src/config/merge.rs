//! Merge policy: defaults every configuration build starts from.

pub(crate) mod service;

use crate::directory::DirectorySettings;
use crate::logging::LoggingConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with the built-in defaults (lowest precedence).
///
/// Values come from the `Default` impls of the settings types.
pub(crate) fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let directory = DirectorySettings::default();
    let logging = LoggingConfig::default();
    Config::builder()
        .set_default("directory.name", directory.name)?
        .set_default("directory.warn_on_conflict", directory.warn_on_conflict)?
        .set_default("logging.enabled", logging.enabled)?
        .set_default("logging.level", logging.level)?
        .set_default("logging.format", logging.format)?
        .set_default("logging.output", logging.output)?
        .set_default("logging.color", logging.color)
}
