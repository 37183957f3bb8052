//! Binary entry point for glimpse.
//!
//! This binary provides the CLI interface for visual product search.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use commands::{CatalogAction, DescriptorFormat};
use glimpse::config::GlimpseConfig;
use glimpse::observability::{self, InitOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Glimpse - visual product search for storefront catalogs.
#[derive(Parser)]
#[command(name = "glimpse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "GLIMPSE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Print the descriptor of an image.
    Extract {
        /// Image file.
        image: PathBuf,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "summary")]
        format: DescriptorFormat,
    },

    /// Extract descriptors for catalog items that lack one.
    Index {
        /// Re-extract items that already have a current descriptor.
        #[arg(long)]
        force: bool,

        /// Show what would be processed without writing.
        #[arg(long)]
        dry_run: bool,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Find catalog items that look like an image.
    Search {
        /// Image file to search with.
        #[arg(conflicts_with = "base64")]
        image: Option<PathBuf>,

        /// Base64 payload (optionally a data URL); `@FILE` reads it from a
        /// file and `@-` from stdin.
        #[arg(long)]
        base64: Option<String>,

        /// Maximum number of results.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Manage catalog items.
    Catalog {
        /// Catalog subcommand.
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Show indexing coverage.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration.
    Config {
        /// Show current configuration.
        #[arg(long)]
        show: bool,
    },
}

fn main() -> ExitCode {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let (config, warnings) = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let _observability = match observability::init_from_config(
        &config,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: config.metrics.port.is_some(),
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    for warning in &warnings {
        tracing::warn!(%warning, "Configuration input skipped");
    }

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration from `--config`, else the default location.
fn load_config(path: Option<&Path>) -> glimpse::Result<(GlimpseConfig, Vec<String>)> {
    GlimpseConfig::load(path)
}

/// Runs the selected command.
fn run_command(command: Commands, config: &GlimpseConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Extract { image, format } => commands::cmd_extract(config, &image, format),
        Commands::Index {
            force,
            dry_run,
            json,
        } => commands::cmd_index(config, force, dry_run, json),
        Commands::Search {
            image,
            base64,
            limit,
        } => commands::cmd_search(config, image, base64, limit),
        Commands::Catalog { action } => commands::cmd_catalog(config, action),
        Commands::Status { json } => commands::cmd_status(config, json),
        Commands::Config { show } => commands::cmd_config(config, show),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_with_base64() {
        let cli = Cli::parse_from(["glimpse", "search", "--base64", "@payload.txt", "-l", "3"]);
        match cli.command {
            Commands::Search {
                image,
                base64,
                limit,
            } => {
                assert!(image.is_none());
                assert_eq!(base64.as_deref(), Some("@payload.txt"));
                assert_eq!(limit, Some(3));
            },
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn test_search_rejects_image_and_base64() {
        let result = Cli::try_parse_from(["glimpse", "search", "a.png", "--base64", "aGk="]);
        assert!(result.is_err());
    }
}
