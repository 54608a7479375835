//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use tw_core::{FrameFormat, MigrationTarget};

/// Tidewater - versioned schema migrations and streamed query results
#[derive(Parser, Debug)]
#[command(name = "tw")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move the database to a migration step
    Migrate(MigrateArgs),

    /// Show the current migration position
    Status(StatusArgs),

    /// List every recorded step application
    History(HistoryArgs),

    /// Run a query and stream the result to stdout
    Query(QueryArgs),

    /// Serve health, migration status, and streamed queries over HTTP
    Serve(ServeArgs),
}

/// Arguments for the migrate command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Target step: a name, a position (-1 for none), or "latest"
    #[arg(long, allow_hyphen_values = true)]
    pub to: Option<MigrationTarget>,

    /// Print the steps that would run without applying them
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the history command
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Include the executed change for each entry
    #[arg(long)]
    pub show_sql: bool,
}

/// Report output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

/// Arguments for the query command
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// SQL to execute
    pub sql: String,

    /// Result format (csv or ndjson)
    #[arg(short, long, default_value = "csv")]
    pub format: FrameFormat,

    /// Skip migrating to the latest step first
    #[arg(long)]
    pub no_migrate: bool,
}

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Override the configured bind address
    #[arg(long)]
    pub host: Option<String>,

    /// Override the configured port
    #[arg(long)]
    pub port: Option<u16>,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
