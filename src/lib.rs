//! cfgdesc: Configuration Description Directory
//!
//! Immutable descriptions of configuration parameters, the provider contract for
//! publishing them at runtime, and a directory that aggregates any number of
//! providers into one consistent, replaying add/remove event stream.

pub mod config;
pub mod description;
pub mod directory;
mod dispatch;
pub mod error;
pub mod logging;
pub mod provider;
pub mod thing;
pub mod tooling;
pub mod types;

pub use description::{
    ConfigDescription, ConfigDescriptionParameter, ParameterContext, ParameterType,
};
pub use directory::{ConfigDescriptionDirectory, DirectorySettings, DirectoryStats};
pub use error::ApiError;
pub use provider::{
    ConfigDescriptionListener, ConfigDescriptionProvider, StaticDescriptionProvider,
};
pub use thing::{ChannelDefinition, ChannelType};
