//! CLI command definitions for xg2g-config
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod diff;
pub mod registry;
pub mod show;

use clap::{Parser, Subcommand};
use diff::DiffArgs;
use registry::RegistryArgs;
use show::ShowArgs;
use std::path::PathBuf;

/// Resolve, inspect and watch xg2g gateway configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML config file (default: $XG2G_CONFIG, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to an extra deprecation manifest (default: $XG2G_DEPRECATIONS_FILE)
    #[arg(long, global = true)]
    pub deprecations: Option<PathBuf>,

    /// Ignore any config file and resolve from defaults and environment only
    #[arg(long, global = true, conflicts_with = "config")]
    pub no_file: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate the configuration (default if no subcommand given)
    Check,

    /// Print the resolved configuration with secrets masked
    Show(ShowArgs),

    /// Compare the configurations resolved from two files
    Diff(DiffArgs),

    /// List every registered setting with its env variable and default
    Registry(RegistryArgs),

    /// Watch the config file and reload on every change
    Watch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_args_after_subcommand() {
        let cli = Cli::parse_from(["xg2g-config", "show", "--format", "json", "--config", "/etc/xg2g/config.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/xg2g/config.yaml")));
        assert!(matches!(cli.command, Some(Command::Show(_))));
    }

    #[test]
    fn test_no_subcommand_defaults_to_none() {
        let cli = Cli::parse_from(["xg2g-config", "--log", "off"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log, "off");
    }
}
