use anyhow::{Context, Result};
use clap::Parser;
use std::str::FromStr;
use tracing::info;
use volley_config::LogLevel;
use volley_functions::default_registry;
use volley_logging::init_logging_from_config;

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};
use commands::{config, functions, load_config, run, validate};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = LogLevel::from_str(level)
            .map_err(|e| anyhow::anyhow!("Invalid --log-level '{}': {}", level, e))?;
        config.logging.filter = None;
    }
    init_logging_from_config(&config.logging)?;
    info!("Volley CLI starting");

    match &cli.command {
        Some(Commands::Run {
            plan,
            properties,
            summary,
        }) => run::handle_run(&config, plan, properties, *summary).await,
        Some(Commands::Validate { plan }) => validate::handle_validate(&config, plan),
        Some(Commands::Functions) => {
            functions::handle_functions(&default_registry());
            Ok(())
        }
        Some(Commands::Config { config_cmd }) => match config_cmd {
            ConfigCommands::Validate { config_file } => {
                config::handle_config_validate(config_file)
            }
            ConfigCommands::Generate { output, force } => {
                config::handle_config_generate(output, *force)
            }
            ConfigCommands::Show {
                config_file,
                format,
            } => config::handle_config_show(
                config_file.as_deref().or(cli.config.as_deref()),
                format,
            ),
        },
        None => {
            // If no subcommand is provided, print help
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            Ok(())
        }
    }
}
