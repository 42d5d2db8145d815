//! Spindle command-line entry point.
//!
//! Binary name: `spindle`
//!
//! Parses CLI arguments, sets up tracing, loads `spindle.toml`, then
//! dispatches to the command handler.

mod cli;

use clap::Parser;

use cli::{Cli, Commands};
use spindle_infra::config::{load_config, resolve_config_path};
use spindle_observe::TracingOptions;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,spindle_core=debug",
        _ => "trace",
    };
    spindle_observe::init_tracing(&TracingOptions::new(filter).otel(cli.otel))
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    let config = load_config(&resolve_config_path(cli.config.as_deref()));

    let result = match &cli.command {
        Commands::Validate { file } => cli::inspect::validate(file, &config, cli.json),
        Commands::Show { file } => cli::inspect::show(file, &config, cli.json),
        Commands::Specs { file } => cli::inspect::specs(file, &config, cli.json),
        Commands::Convert { input, output } => {
            cli::convert::convert(input, output, &config, cli.json)
        }
    };

    spindle_observe::shutdown_tracing();
    result
}
