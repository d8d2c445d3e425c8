//! CLI command definitions for the `wpt` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod approval;
pub mod render;
pub mod run;
pub mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Run sequential workflows with task steps and approval gates.
#[derive(Parser)]
#[command(name = "wpt", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write log lines to stderr as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workflow manifest to completion.
    Run(run::RunArgs),

    /// Parse and validate a workflow manifest without running it.
    #[command(alias = "check")]
    Validate {
        /// Path to the workflow YAML file.
        manifest: PathBuf,

        /// Print the normalized manifest as YAML.
        #[arg(long, conflicts_with = "step")]
        print: bool,

        /// Show a single step of the built workflow.
        #[arg(long, value_name = "ID")]
        step: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
