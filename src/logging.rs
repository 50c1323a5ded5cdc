// src/logging.rs

//! Diagnostics for builds and the dev loop.
//!
//! Task runs, watch batches and dev-server requests report through
//! `tracing`; this module installs the stderr subscriber they write to. The
//! level comes from `--log-level`, then `ASSETPIPE_LOG`, and is `info`
//! otherwise, so `ASSETPIPE_LOG=debug assetpipe dev` shows every written
//! output without touching the command line. `plan` owns stdout.

use anyhow::Result;
use tracing::{Level, warn};
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "ASSETPIPE_LOG";

/// Level picked for this invocation, plus an `ASSETPIPE_LOG` value that
/// could not be understood (reported once the subscriber is up).
#[derive(Debug, Clone, PartialEq, Eq)]
struct LevelChoice {
    level: Level,
    rejected_env: Option<String>,
}

/// Install the stderr subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let choice = resolve_level(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref());

    // Module paths (`assetpipe::watch::coordinator`) only help when digging.
    fmt()
        .with_max_level(choice.level)
        .with_target(choice.level >= Level::DEBUG)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))?;

    if let Some(value) = choice.rejected_env {
        warn!(%value, "ignoring unrecognised {LOG_ENV_VAR}; using {}", choice.level);
    }
    Ok(())
}

fn resolve_level(cli_level: Option<LogLevel>, env_value: Option<&str>) -> LevelChoice {
    if let Some(flag) = cli_level {
        return LevelChoice {
            level: flag_level(flag),
            rejected_env: None,
        };
    }
    match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        None => LevelChoice {
            level: Level::INFO,
            rejected_env: None,
        },
        Some(value) => match value.parse::<Level>() {
            Ok(level) => LevelChoice {
                level,
                rejected_env: None,
            },
            Err(_) => LevelChoice {
                level: Level::INFO,
                rejected_env: Some(value.to_string()),
            },
        },
    }
}

fn flag_level(flag: LogLevel) -> Level {
    match flag {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}
