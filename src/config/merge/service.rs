//! MergeService: orchestrates sources, applies merge policy, deserializes to CfgDescConfig.

use crate::config::sources::{environment, file};
use crate::config::CfgDescConfig;
use config::ConfigError;
use std::path::Path;

use super::builder_with_defaults;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> config file -> environment (highest).
    pub fn load(config_file: Option<&Path>) -> Result<CfgDescConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = match config_file {
            Some(path) => file::add_to_builder(builder, path)?,
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;

        let config = builder.build()?;
        config.try_deserialize()
    }
}
