//! cfgdesc CLI Binary
//!
//! Command-line interface for inspecting configuration description files.

use anyhow::Context;
use cfgdesc::logging::init_logging;
use cfgdesc::tooling::cli::{Cli, CliContext};
use clap::Parser;
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context =
        CliContext::new(cli.config.clone()).context("Error loading configuration")?;

    let mut logging = context.config().logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
        logging.output = "stderr".to_string();
    } else if cli.config.is_none() {
        logging.level = "warn".to_string();
    }
    init_logging(Some(&logging)).context("Error initializing logging")?;

    Ok(context.execute(&cli.command)?)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
