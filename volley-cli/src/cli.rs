//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a test plan to completion
    Run {
        /// Path to the plan file
        plan: PathBuf,

        /// Set a property (repeatable), e.g. -J env=staging
        #[arg(short = 'J', long = "property", value_name = "NAME=VALUE")]
        properties: Vec<String>,

        /// Print a per-label summary when the test ends
        #[arg(long)]
        summary: bool,
    },

    /// Parse and compile a plan without running it
    Validate {
        /// Path to the plan file
        plan: PathBuf,
    },

    /// List the available template functions
    Functions,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Path to configuration file
        #[arg(long, value_name = "PATH")]
        config_file: Option<PathBuf>,

        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "volley",
            "--log-level",
            "debug",
            "run",
            "plan.yaml",
            "-J",
            "env=staging",
            "-J",
            "users=3",
            "--summary",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Some(Commands::Run {
                plan,
                properties,
                summary,
            }) => {
                assert_eq!(plan, PathBuf::from("plan.yaml"));
                assert_eq!(properties, ["env=staging", "users=3"]);
                assert!(summary);
            }
            _ => panic!("expected run"),
        }
    }
}
