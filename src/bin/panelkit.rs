//! Panelkit CLI Binary
//!
//! Command-line interface for chatting up dashboard components and managing
//! the stored registry and layout.

use anyhow::Context;
use clap::Parser;
use panelkit::config::ConfigLoader;
use panelkit::logging::{init_logging, LoggingConfig};
use panelkit::tooling::cli::{Cli, CliContext};
use std::process;

/// Config-file logging settings with command-line flags applied on top.
fn logging_config(cli: &Cli) -> anyhow::Result<LoggingConfig> {
    let mut logging = ConfigLoader::resolve(cli.config.as_deref())
        .context("loading configuration")?
        .logging;
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        logging.output = output.clone();
    }
    if let Some(file) = &cli.log_file {
        logging.file = Some(file.clone());
    }
    Ok(logging)
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let logging = logging_config(cli)?;
    init_logging(Some(&logging)).context("initializing logging")?;

    let context =
        CliContext::new(cli.config.clone()).context("opening the panelkit dashboard")?;
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
