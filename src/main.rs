//! bikeflow - Main Entry Point
//!
//! Runs the bicycle traffic forecasting pipeline from the command line.

use bikeflow::cli::{build_config, build_inspect_config, cmd_inspect, cmd_run, Cli, Commands};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bikeflow=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { data_dir, out_dir, config, train_many, final_run, save_model } => {
            let config = build_config(config.as_deref(), data_dir, out_dir, train_many, final_run, save_model)?;
            cmd_run(&config)?;
        }
        Commands::Inspect { data_dir, config, future_year } => {
            let config = build_inspect_config(config.as_deref(), data_dir, future_year)?;
            cmd_inspect(&config)?;
        }
    }

    Ok(())
}
