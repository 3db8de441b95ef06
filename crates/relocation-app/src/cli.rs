//! CLI argument definitions for the relocation planner.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Relocation planner: inspect and edit the plan, or replay a recorded voice session.
#[derive(Parser, Debug)]
#[command(name = "relocation", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", env = "RELOCATION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the plan database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print selected services, tasks, and the relocation profile as JSON.
    Show,

    /// Clear services, tasks, and profile.
    Reset,

    /// Select services by id or synonym and build their tasks.
    Select {
        #[arg(required = true)]
        services: Vec<String>,
    },

    /// Feed a recorded realtime event log (one JSON frame per line) through a
    /// voice session and print what the session sends back.
    Replay { file: PathBuf },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag or RELOCATION_CONFIG > ~/.relocation/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        default_config_path()
    }

    /// Data directory override, if given.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Filter directive for the log subscriber when `RUST_LOG` is unset.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

fn default_config_path() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".relocation").join("config.toml");
    }
    PathBuf::from("config.toml")
}
