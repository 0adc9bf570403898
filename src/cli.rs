// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands, their arguments, and global flags.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "productionapp")]
#[command(about = "Deploy a container image and get back a public URL")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Break deploy locks held by other processes; with init, overwrite the file
    #[arg(long, global = true)]
    pub force: bool,

    /// Config file (default: productionapp.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new productionapp.yml configuration file
    Init {
        /// Name of the example deployment
        #[arg(long)]
        name: Option<String>,

        /// Image of the example deployment
        #[arg(long)]
        image: Option<String>,
    },

    /// Create or update a deployment
    Deploy {
        /// Container image to run
        #[arg(short, long)]
        image: String,

        /// Port the container listens on
        #[arg(short, long, default_value_t = 80, allow_negative_numbers = true)]
        port: i64,

        /// Deployment name (generated when omitted)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Tear down a deployment
    Destroy {
        /// Deployment name
        #[arg(short, long)]
        name: String,
    },

    /// Reconcile the deployments declared in the config file
    Apply {
        /// Only show what would change
        #[arg(long)]
        dry_run: bool,
    },

    /// List recorded deployments
    List,

    /// Show a deployment's recorded state and platform status
    Status {
        /// Deployment name
        #[arg(short, long)]
        name: String,
    },

    /// Print the resource schema as JSON
    Schema,
}
