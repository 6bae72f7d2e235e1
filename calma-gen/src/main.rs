//! calma-gen - Meditation Session Generator worker
//!
//! **[GEN-OV-020]** Durable-environment shim: parses a JSON job payload,
//! runs one generation task, prints the result contract to stdout and
//! exits 0/1 by task success. The process exit code is advisory; the
//! meditations row is the durable outcome.

use clap::Parser;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use calma_gen::config::Settings;
use calma_gen::models::MeditationConfig;
use calma_gen::workflow;
use calma_gen::AppState;

#[derive(Parser, Debug)]
#[command(name = "calma-gen", about = "Meditation session generation worker")]
struct Args {
    /// Inline JSON job payload: {"config": {...}}
    #[arg(long, conflicts_with = "payload_file")]
    payload: Option<String>,

    /// Path to a file containing the JSON job payload
    #[arg(long)]
    payload_file: Option<std::path::PathBuf>,
}

/// Envelope the durable environment hands to the worker
#[derive(Debug, Deserialize)]
struct JobPayload {
    config: MeditationConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting calma-gen (Session Generator) worker");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let raw = match (args.payload, args.payload_file) {
        (Some(inline), None) => inline,
        (None, Some(path)) => std::fs::read_to_string(&path)?,
        _ => anyhow::bail!("Exactly one of --payload or --payload-file is required"),
    };
    let payload: JobPayload = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid job payload: {}", e))?;

    let settings = Settings::load()?;
    info!("Database: {}", settings.database_path.display());

    let state = AppState::from_settings(settings).await?;

    let result = workflow::run_generation(&state, payload.config).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    state.pool.close().await;
    std::process::exit(if result.success { 0 } else { 1 });
}
