//! Clap derive structures for the `doorlink` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// doorlink -- Glutz eAccess to Eliona synchronization service
#[derive(Debug, Parser)]
#[command(
    name = "doorlink",
    version,
    about = "Sync Glutz eAccess door controllers with the Eliona platform",
    long_about = "Mirrors eAccess door devices into Eliona assets, pushes their status \
        as telemetry and opens doors on request from the platform.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "DOORLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format
    #[arg(
        long,
        env = "DOORLINK_LOG_FORMAT",
        default_value = "text",
        global = true
    )]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the synchronization service until interrupted
    Run(RunArgs),

    /// Load and resolve the configuration, then print a summary
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Do not consume platform events (no door actuation)
    #[arg(long)]
    pub no_listen: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Also print the effective configuration with secrets masked
    #[arg(long)]
    pub print_config: bool,
}
