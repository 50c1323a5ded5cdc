// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `assetpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetpipe",
    version,
    about = "Build front-end assets for a site or theme, with watch and live reload.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Assetpipe.toml` in the current working directory; built-in
    /// defaults are used when it does not exist.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Target profile to build for (overrides `[config].profile`).
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run every task once.
    Build {
        /// Exit non-zero when any task failed, not only on fatal errors.
        #[arg(long)]
        fail_on_error: bool,
    },
    /// Build, then watch sources and serve with live reload until Ctrl-C.
    Dev,
    /// Remove the active profile's output root.
    Clean,
    /// Print the resolved profile, tasks, graph and watch table.
    Plan,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
