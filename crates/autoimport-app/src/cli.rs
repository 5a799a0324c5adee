//! CLI argument definitions for the AutoImport application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AutoImport: customer assistant chat, sales trainer and leads dashboard.
#[derive(Parser, Debug)]
#[command(name = "autoimport", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (e.g. http://localhost:8000).
    #[arg(short = 'u', long = "api-url", global = true)]
    pub api_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Talk to the assistant as a customer.
    Chat,
    /// Practice a sales conversation against a simulated client.
    Train {
        /// Preset to start with (see `autoimport presets`).
        #[arg(short = 'p', long = "preset")]
        preset: Option<String>,
    },
    /// List simulator presets.
    Presets,
    /// List captured leads.
    Leads,
    /// Show the lead captured in one conversation.
    Lead { session_id: String },
    /// Show lead counts by qualification.
    Stats,
    /// Print a stored customer conversation.
    Transcript { session_id: String },
    /// Check that the backend is up.
    Health,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > AUTOIMPORT_CONFIG env var > platform default (~/.autoimport/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("AUTOIMPORT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the backend base URL.
    ///
    /// Priority: --api-url flag > AUTOIMPORT_API_URL env var > config file value.
    pub fn resolve_base_url(&self, config_url: &str) -> String {
        if let Some(ref url) = self.api_url {
            return url.clone();
        }
        match std::env::var("AUTOIMPORT_API_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => config_url.to_string(),
        }
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > AUTOIMPORT_LOG env var > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        match std::env::var("AUTOIMPORT_LOG") {
            Ok(level) if !level.trim().is_empty() => level,
            _ => config_level.to_string(),
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".autoimport").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".autoimport").join("config.toml");
    }
    PathBuf::from("config.toml")
}
