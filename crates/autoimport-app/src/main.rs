//! AutoImport application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing (stderr, so the transcript on stdout stays clean)
//! 3. Build the backend client
//! 4. Run the requested command: interactive chat, trainer, or a dashboard query

mod cli;
mod dashboard;
mod repl;

use std::sync::Arc;

use clap::Parser;

use autoimport_chat::{
    builtin_presets, Conversation, ConversationSettings, CustomerEndpoint, TrainingEndpoint,
    TrainingSession,
};
use autoimport_client::BackendClient;
use autoimport_core::{AutoImportConfig, Channel};

use cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first: it supplies the fallback log level.
    let config_file = args.resolve_config_path();
    let config = AutoImportConfig::load_or_default(&config_file);
    let log_level = args.resolve_log_level(&config.general.log_level);

    // Tracing.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting AutoImport v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!(path = %config_file.display(), "Configuration loaded");

    let base_url = args.resolve_base_url(&config.backend.base_url);
    let client = BackendClient::new(&base_url)?;
    tracing::info!(base_url = %client.base_url(), "Backend client ready");

    match args.command {
        Command::Chat => {
            let conversation = Conversation::new(
                Channel::Customer,
                Arc::new(CustomerEndpoint::new(client)),
                ConversationSettings::customer(&config),
            );
            repl::run_chat(&conversation).await?;
        }
        Command::Train { preset } => {
            let endpoint = TrainingEndpoint::new(client, config.simulator.default_preset.clone());
            let session = TrainingSession::new(Arc::new(endpoint), &config)?;
            session.load_presets().await?;
            if let Some(id) = preset {
                session.select_preset(&id)?;
            }
            repl::run_trainer(&session).await?;
        }
        Command::Presets => {
            let presets = match client.presets().await {
                Ok(presets) if !presets.is_empty() => presets,
                Ok(_) => builtin_presets(),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load presets, showing built-in catalog");
                    builtin_presets()
                }
            };
            print!("{}", dashboard::format_presets(&presets));
        }
        Command::Leads => {
            let leads = client.leads().await?;
            print!("{}", dashboard::format_leads(&leads));
        }
        Command::Lead { session_id } => {
            let lead = client.lead(&session_id).await?;
            print!("{}", dashboard::format_lead(&lead));
        }
        Command::Stats => {
            let stats = client.stats().await?;
            print!("{}", dashboard::format_stats(&stats));
        }
        Command::Transcript { session_id } => {
            let entries = client.transcript(&session_id).await?;
            print!("{}", dashboard::format_transcript(&entries));
        }
        Command::Health => {
            let report = client.health().await?;
            print!("{}", dashboard::format_health(&report));
        }
    }

    Ok(())
}
