//! Tooling Layer
//!
//! Command-line inspection of description files through the directory.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
