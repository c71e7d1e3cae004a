mod analyzer;
mod config;
mod core;
mod decoder;
mod error;
mod server;
mod shared;
mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::analyzer::OnnxEmbedder;
use crate::config::AppConfig;
use crate::core::{artifacts, AnomalyPipeline, ModelArtifacts};
use crate::shared::constants;

#[derive(Parser)]
#[command(author, version, about = "Flags unusual frames in surveillance video", long_about = None)]
struct Cli {
    /// Also write logs to debug.log in the working directory
    #[arg(long, global = true, default_value_t = false)]
    debug_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP upload service
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(short, long)]
        artifact_dir: Option<PathBuf>,
        #[arg(short, long)]
        embedding_model: Option<PathBuf>,
    },
    /// Run detection on one video and print the result as JSON
    Detect {
        #[arg(short, long)]
        video: PathBuf,
        #[arg(short, long, help = "Export directory (default: a fresh directory under OUTPUT_ROOT)")]
        output_dir: Option<PathBuf>,
        #[arg(short, long)]
        artifact_dir: Option<PathBuf>,
        #[arg(short, long)]
        embedding_model: Option<PathBuf>,
    },
    /// Check that the fitted models load and report their shapes
    Inspect {
        #[arg(short, long)]
        artifact_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let debug_log = cli.debug_log.then(|| Path::new(constants::DEBUG_LOG_FILE));
    crate::utils::logger::init(debug_log)?;

    let mut config = AppConfig::from_env()?;

    match cli.command {
        Commands::Serve { host, port, artifact_dir, embedding_model } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            apply_model_overrides(&mut config, artifact_dir, embedding_model);

            let pipeline = build_pipeline(&config)?;
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(server::serve(config, pipeline))?;
        }
        Commands::Detect { video, output_dir, artifact_dir, embedding_model } => {
            apply_model_overrides(&mut config, artifact_dir, embedding_model);
            if !video.is_file() {
                anyhow::bail!("Video not found: {}", video.display());
            }

            let pipeline = build_pipeline(&config)?;
            let result = match output_dir {
                Some(dir) => pipeline.detect_anomalies_into(&video, &dir)?,
                None => pipeline.detect_anomalies(&video)?,
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Inspect { artifact_dir } => {
            apply_model_overrides(&mut config, artifact_dir, None);

            let report = artifacts::inspect(&config.artifact_dir);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.anomaly_model_ok() {
                anyhow::bail!("Anomaly model failed to load from {}", config.artifact_dir.display());
            }
        }
    }

    Ok(())
}

fn apply_model_overrides(config: &mut AppConfig, artifact_dir: Option<PathBuf>, embedding_model: Option<PathBuf>) {
    if let Some(dir) = artifact_dir {
        config.artifact_dir = dir;
    }
    if embedding_model.is_some() {
        config.embedding_model = embedding_model;
    }
}

/// Load every model up front; any failure here ends the process.
fn build_pipeline(config: &AppConfig) -> Result<AnomalyPipeline> {
    let artifacts = ModelArtifacts::load(&config.artifact_dir)
        .with_context(|| format!("Failed to load models from {}", config.artifact_dir.display()))?;
    let embedder = OnnxEmbedder::load(&config.embedding_model_path())
        .context("Failed to load embedding network")?;
    tracing::info!(
        embedding = %embedder.path().display(),
        reducer = artifacts.has_reducer(),
        output_root = %config.output_root.display(),
        "pipeline ready"
    );

    Ok(AnomalyPipeline::new(Arc::new(embedder), artifacts, &config.output_root))
}
