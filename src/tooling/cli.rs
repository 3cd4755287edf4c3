//! CLI Tooling
//!
//! Loads each description file given on the command line as its own provider,
//! registers the providers with a directory in argument order, and reports the
//! aggregated result. Because registration order decides URI conflicts, the
//! first file publishing a URI wins.

use crate::config::{CfgDescConfig, ConfigLoader};
use crate::description::ConfigDescription;
use crate::directory::ConfigDescriptionDirectory;
use crate::error::ApiError;
use crate::provider::{ConfigDescriptionProvider, StaticDescriptionProvider};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// cfgdesc - configuration description inspector
#[derive(Parser)]
#[command(name = "cfgdesc")]
#[command(about = "Inspect configuration descriptions aggregated from description files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List the live descriptions
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Description files, in priority order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show the parameters of one description
    Show {
        /// Description URI
        uri: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Description files, in priority order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List descriptions hidden by a file earlier on the command line
    Conflicts {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Description files, in priority order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Execution context for CLI commands
pub struct CliContext {
    config: CfgDescConfig,
}

impl CliContext {
    /// Create a CLI context, loading configuration from `config_path` if given
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        Ok(Self { config })
    }

    pub fn with_config(config: CfgDescConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CfgDescConfig {
        &self.config
    }

    /// Execute a CLI command, returning the text to print
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let (format, files) = match command {
            Commands::List { format, files }
            | Commands::Show { format, files, .. }
            | Commands::Conflicts { format, files } => (format.as_str(), files.as_slice()),
        };
        let json_output = match format {
            "json" => true,
            "text" => false,
            other => {
                return Err(ApiError::InvalidArgument(format!(
                    "Invalid format: {} (must be 'text' or 'json')",
                    other
                )))
            }
        };

        let (directory, providers) = self.load_directory(files)?;
        let result = match command {
            Commands::List { .. } => Ok(render_list(&directory, json_output)),
            Commands::Show { uri, .. } => render_show(&directory, uri, json_output),
            Commands::Conflicts { .. } => Ok(render_conflicts(&directory, &providers, json_output)),
        };
        directory.shutdown();
        result
    }

    fn load_directory(
        &self,
        files: &[PathBuf],
    ) -> Result<(ConfigDescriptionDirectory, Vec<Arc<StaticDescriptionProvider>>), ApiError> {
        let directory = ConfigDescriptionDirectory::with_settings(self.config.directory.clone());
        let mut providers = Vec::with_capacity(files.len());
        for path in files {
            let provider = Arc::new(StaticDescriptionProvider::from_file(path)?);
            debug!(
                file = %path.display(),
                descriptions = provider.descriptions().len(),
                "Loaded description file"
            );
            directory.register_provider(provider.clone())?;
            providers.push(provider);
        }
        Ok((directory, providers))
    }
}

fn render_list(directory: &ConfigDescriptionDirectory, json_output: bool) -> String {
    let descriptions = directory.list();
    if json_output {
        let items: Vec<_> = descriptions
            .iter()
            .map(|d| {
                json!({
                    "uri": d.uri(),
                    "provider": directory.owner_of(d.uri()),
                    "parameters": d.parameters(),
                })
            })
            .collect();
        return serde_json::Value::Array(items).to_string();
    }

    if descriptions.is_empty() {
        return "No descriptions found.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["URI", "Parameters", "Provider"]);
    for description in &descriptions {
        table.add_row(vec![
            description.uri().to_string(),
            description.parameters().len().to_string(),
            directory.owner_of(description.uri()).unwrap_or_default(),
        ]);
    }
    table.to_string()
}

fn render_show(
    directory: &ConfigDescriptionDirectory,
    uri: &str,
    json_output: bool,
) -> Result<String, ApiError> {
    let description = directory
        .lookup(uri)
        .ok_or_else(|| ApiError::InvalidArgument(format!("No description for URI: {}", uri)))?;
    let owner = directory.owner_of(uri).unwrap_or_default();

    if json_output {
        let value: &ConfigDescription = &description;
        return Ok(json!({ "provider": owner, "description": value }).to_string());
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Name", "Type", "Context", "Required", "Default", "Label"]);
    for parameter in description.parameters() {
        table.add_row(vec![
            parameter.name().to_string(),
            parameter.parameter_type().as_str().to_string(),
            parameter
                .context()
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| "-".to_string()),
            if parameter.is_required() { "yes" } else { "no" }.to_string(),
            parameter
                .default_value()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
            parameter.label().unwrap_or("-").to_string(),
        ]);
    }
    Ok(format!(
        "URI: {}\nProvider: {}\n{}",
        description.uri(),
        owner,
        table
    ))
}

fn render_conflicts(
    directory: &ConfigDescriptionDirectory,
    providers: &[Arc<StaticDescriptionProvider>],
    json_output: bool,
) -> String {
    let mut rows = Vec::new();
    for provider in providers {
        for description in provider.descriptions() {
            let owner = directory.owner_of(description.uri()).unwrap_or_default();
            if owner != provider.name() {
                rows.push((description.uri().to_string(), owner, provider.name().to_string()));
            }
        }
    }

    if json_output {
        let items: Vec<_> = rows
            .iter()
            .map(|(uri, owner, shadowed)| json!({ "uri": uri, "owner": owner, "shadowed": shadowed }))
            .collect();
        return serde_json::Value::Array(items).to_string();
    }

    if rows.is_empty() {
        return "No conflicts.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["URI", "Owner", "Shadowed"]);
    for (uri, owner, shadowed) in &rows {
        table.add_row(vec![uri, owner, shadowed]);
    }
    table.to_string()
}
