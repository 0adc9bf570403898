// ABOUTME: Entry point for the productionapp CLI application.
// ABOUTME: Parses arguments, loads configuration, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use productionapp::config::Config;
use productionapp::error::Result;
use productionapp::output::{Output, OutputMode};
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = OutputMode::from_flags(cli.quiet, cli.json);

    if let Err(e) = run(cli, mode).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

/// Load the config named on the command line, or discover one in `cwd`.
///
/// Only `apply` requires a config file; everything else falls back to defaults.
fn load_config(path: Option<&Path>, cwd: &Path, required: bool) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None if required => Config::discover(cwd),
        None => Config::discover_or_default(cwd),
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    let cwd = env::current_dir()?;
    let output = Output::new(mode);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { name, image } => commands::init(
            &cwd,
            name.as_deref(),
            image.as_deref(),
            cli.force,
            output,
        ),
        Commands::Deploy { image, port, name } => {
            let config = load_config(config_path, &cwd, false)?;
            commands::deploy(&config, image, port, name, cli.force, output).await
        }
        Commands::Destroy { name } => {
            let config = load_config(config_path, &cwd, false)?;
            commands::destroy(&config, &name, cli.force, output).await
        }
        Commands::Apply { dry_run } => {
            let config = load_config(config_path, &cwd, true)?;
            commands::apply(&config, dry_run, cli.force, output).await
        }
        Commands::List => {
            let config = load_config(config_path, &cwd, false)?;
            commands::list(&config, output).await
        }
        Commands::Status { name } => {
            let config = load_config(config_path, &cwd, false)?;
            commands::status(&config, &name, output).await
        }
        Commands::Schema => commands::schema(),
    }
}
