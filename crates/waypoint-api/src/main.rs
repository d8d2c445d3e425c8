//! Waypoint CLI entry point.
//!
//! Binary name: `wpt`
//!
//! Parses CLI arguments, sets up logging, then dispatches to the command
//! handler.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use clap_complete::generate;
use waypoint_observe::tracing_setup::{
    LogFormat, TracingOptions, filter_for_verbosity, init_tracing, shutdown_tracing,
};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let enable_otel = matches!(&cli.command, Commands::Run(args) if args.otel);
    init_tracing(&TracingOptions {
        filter: filter_for_verbosity(cli.quiet, cli.verbose).to_string(),
        format: if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        enable_otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let outcome = match cli.command {
        Commands::Run(args) => cli::run::run_workflow(args, cli.json, cli.quiet).await,
        Commands::Validate {
            manifest,
            print,
            step,
        } => {
            cli::validate::validate_manifest(&manifest, print, step.as_deref(), cli.json).await
        }
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(shell, &mut cmd, "wpt", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    };

    shutdown_tracing();
    outcome
}
