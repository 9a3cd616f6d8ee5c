//! `sivana` — CLI front-end over the fingerprinting core.
//!
//! One binary, four subcommands (`index`, `query`, `serve`, `stats`),
//! built on the same core the HTTP server uses.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sivana::{discover_audio_files, fingerprint_samples, index_directory, match_query, open_index, Config};

#[derive(Parser)]
#[command(name = "sivana", about = "Landmark-based acoustic fingerprinting")]
struct Cli {
    /// Path to a TOML config file; falls back to defaults plus SIVANA_* env overrides.
    #[arg(long, env = "SIVANA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Indexes every audio file under a directory.
    Index {
        directory: PathBuf,
    },
    /// Matches a single audio file against the index.
    Query {
        file: PathBuf,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// Serves the HTTP API.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Prints index statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let index = open_index(&config)?;

    match cli.command {
        Command::Index { directory } => {
            let files = discover_audio_files(&directory, &config.allowed_extensions)?;
            println!("discovered {} audio files under {}", files.len(), directory.display());
            let summary = index_directory(&directory, &config, Arc::clone(&index), None)?;
            println!("indexed {} files: {} succeeded, {} failed", summary.total, summary.succeeded, summary.failed);
            for outcome in &summary.outcomes {
                if let Some(err) = &outcome.error {
                    eprintln!("  FAILED {}: {err}", outcome.path.display());
                }
            }
        }
        Command::Query { file, top_k } => {
            let samples = sivana::audio::load_audio_file(&file, config.sample_rate)?;
            let hashes = fingerprint_samples(&config, &samples);
            let matches = match_query(index.as_ref(), &hashes, top_k)?;
            if matches.is_empty() {
                println!("no match found");
            }
            for m in matches {
                let meta = index.metadata(&m.track_id)?;
                let title = meta.as_ref().map(|m| m.title.as_str()).unwrap_or("?");
                println!("{}  confidence={:.4}  offset={}  title={title}", m.track_id, m.confidence, m.offset);
            }
        }
        Command::Serve { bind } => {
            let state = sivana::server::AppState { index, config: Arc::new(config) };
            let app = sivana::server::build_router(state);
            let listener = tokio::net::TcpListener::bind(&bind).await?;
            tracing::info!(%bind, "sivana server listening");
            axum::serve(listener, app).await?;
        }
        Command::Stats => {
            let stats = index.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
