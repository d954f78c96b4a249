// src/main.rs

use anyhow::Result;
use clap::Parser;
use comfyenv::ToolConfig;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ToolConfig::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Detect {
            comfyui,
            python,
            output,
        }) => commands::cmd_detect(&config, &comfyui, python.as_deref(), &output),
        Some(Commands::Show { manifest }) => commands::cmd_show(&manifest),
        Some(Commands::Recreate {
            manifest,
            project,
            venv,
            dry_run,
            json,
        }) => commands::cmd_recreate(&config, &manifest, &project, venv, dry_run, json),
        Some(Commands::Sync {
            project,
            venv,
            dry_run,
            json,
        }) => commands::cmd_sync(&config, &project, venv, dry_run, json),
        None => {
            // No command provided, show help
            println!("comfyenv v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'comfyenv --help' for usage information");
            Ok(())
        }
    }
}
