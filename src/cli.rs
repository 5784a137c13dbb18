//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::RoleGroup;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Clusterboard - activation dashboard with local and GitHub-backed storage
///
/// Aggregates activation records per cluster, role and identity, keeps
/// every dataset in a local cache and mirrors it to a GitHub repository
/// when a token is configured.
///
/// Examples:
///   clusterboard ingest march.json
///   clusterboard ingest week1.json week2.json --name "march"
///   clusterboard list
///   clusterboard show march_2026-03-01T08-30-00-250Z.json --cluster 2.2
///   clusterboard token set ghp_xxxx
///   clusterboard init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .clusterboard.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Local cache directory
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Remote access token for this invocation
    ///
    /// Overrides the stored token. Can also be set via CLUSTERBOARD_TOKEN.
    #[arg(
        long,
        value_name = "TOKEN",
        env = "CLUSTERBOARD_TOKEN",
        hide_env_values = true,
        global = true
    )]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Aggregate row files and save them as a new dataset
    ///
    /// Each file holds a JSON array of row objects. Multiple files are
    /// concatenated in order into one dataset.
    Ingest {
        /// Row files to ingest
        #[arg(required = true, value_name = "FILES")]
        files: Vec<PathBuf>,

        /// Source name used for the dataset name and commit message
        #[arg(long, value_name = "NAME")]
        name: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List cached datasets, pulling remote-only ones first
    List,

    /// Render the dashboard of a dataset
    Show {
        /// Dataset name
        name: String,

        /// Restrict identity tables to one cluster
        #[arg(long, value_name = "KEY")]
        cluster: Option<String>,

        /// Show only one role group's identity table
        #[arg(long, value_name = "GROUP")]
        group: Option<GroupFilter>,

        /// Recompute the aggregation from the raw rows
        #[arg(long)]
        reaggregate: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List the raw rows behind one retail identity
    Detail {
        /// Dataset name
        #[arg(value_name = "NAME")]
        dataset: String,

        /// Alternate-system id (NIK SFA); omit for identities without one
        #[arg(long, default_value = "")]
        id: String,

        /// Alternate-system name (NAMA SFA); omit for identities without one
        #[arg(long = "name", value_name = "NAME", default_value = "")]
        user_name: String,
    },

    /// Delete a dataset from both tiers
    Delete {
        /// Dataset name
        name: String,
    },

    /// Delete every dataset
    Clear,

    /// Write a cached dataset as JSON
    Export {
        /// Dataset name
        name: String,

        /// Destination file
        file: PathBuf,
    },

    /// Manage the stored remote token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Generate a default .clusterboard.toml configuration file
    InitConfig,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TokenAction {
    /// Store a token and verify remote access
    Set {
        #[arg(value_name = "TOKEN")]
        value: String,
    },
    /// Remove the stored token
    Clear,
    /// Show the masked token and remote connectivity
    Status,
}

/// Report output options.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Role group selector for --group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GroupFilter {
    Sgs,
    Sds,
    Retail,
}

impl From<GroupFilter> for RoleGroup {
    fn from(filter: GroupFilter) -> Self {
        match filter {
            GroupFilter::Sgs => RoleGroup::Sgs,
            GroupFilter::Sds => RoleGroup::Sds,
            GroupFilter::Retail => RoleGroup::Retail,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref token) = self.token {
            if token.trim().is_empty() {
                return Err("Token must not be empty".to_string());
            }
        }

        match &self.command {
            Command::Ingest { files, name, .. } => {
                for file in files {
                    if !file.is_file() {
                        return Err(format!("Input file does not exist: {}", file.display()));
                    }
                }
                if let Some(name) = name {
                    if name.trim().is_empty() {
                        return Err("Source name must not be empty".to_string());
                    }
                }
            }
            Command::Token {
                action: TokenAction::Set { value },
            } => {
                if value.trim().is_empty() {
                    return Err("Token must not be empty".to_string());
                }
            }
            Command::Detail { id, user_name, .. } => {
                if id.trim().is_empty() && user_name.trim().is_empty() {
                    return Err("A drill-down needs --id, --name or both".to_string());
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
