//! # Lectern — course materials question answering
//!
//! Usage:
//!   lectern init                          # Write a default config file
//!   lectern ingest ./docs                 # Index course documents
//!   lectern ask "What does lesson 2 cover?"
//!   lectern stats                         # Catalogue summary
//!   lectern serve --docs ./docs           # HTTP API (default port 8000)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lectern_agent::{IngestOptions, QueryEngine};
use lectern_core::LecternConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "lectern",
    version,
    about = "📚 Lectern — answer questions about your course materials"
)]
struct Cli {
    /// Config file (defaults to ~/.lectern/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Index every .txt/.md course document in a folder
    Ingest {
        dir: String,
        /// Drop the whole index first
        #[arg(long)]
        clear: bool,
        /// Keep courses that are already indexed
        #[arg(long)]
        skip_existing: bool,
    },
    /// Ask a single question
    Ask {
        question: String,
        /// Continue an existing session
        #[arg(long)]
        session: Option<String>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what is indexed
    Stats,
    /// Start the HTTP API
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
        /// Ingest this folder before serving
        #[arg(long)]
        docs: Option<String>,
    },
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        "lectern=debug,lectern_agent=debug,lectern_knowledge=debug,lectern_gateway=debug,tower_http=debug"
    } else {
        "lectern=info,lectern_agent=info,lectern_knowledge=info,lectern_gateway=info"
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&str>) -> Result<LecternConfig> {
    let config = match path {
        Some(p) => LecternConfig::load_from(&expand_path(p))?,
        None => LecternConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    if let Command::Init { force } = &cli.command {
        let path = cli
            .config
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(LecternConfig::default_path);
        if path.exists() && !force {
            println!("⚠️  {} already exists (use --force to overwrite)", path.display());
            return Ok(());
        }
        LecternConfig::default().save_to(&path)?;
        println!("✅ Wrote {}", path.display());
        return Ok(());
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Command::Serve { port: Some(port), .. } = &cli.command {
        config.gateway.port = *port;
    }
    let engine = QueryEngine::from_config(&config).context("failed to start query engine")?;

    match cli.command {
        Command::Init { .. } => {}
        Command::Ingest { dir, clear, skip_existing } => {
            let opts = IngestOptions {
                clear_existing: clear,
                skip_existing,
            };
            let summary = engine.ingest_folder(&expand_path(&dir), opts).await?;
            println!(
                "📦 Added {} course(s), {} chunk(s); skipped {}, failed {}",
                summary.sources_added, summary.chunks_added, summary.skipped, summary.failed
            );
        }
        Command::Ask { question, session, json } => {
            let resp = engine.submit_query(&question, session.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&resp)?);
            } else {
                println!("{}", resp.answer);
                if !resp.sources.is_empty() {
                    println!("\nSources:");
                    for source in &resp.sources {
                        println!("  - {source}");
                    }
                }
                println!("\nsession: {}", resp.session_id);
            }
        }
        Command::Stats => {
            let stats = engine.stats().await?;
            println!(
                "📚 {} course(s), {} lesson(s), {} chunk(s)",
                stats.total_sources, stats.total_sections, stats.total_chunks
            );
            for s in &stats.per_source {
                println!("  {} — {} lesson(s), {} chunk(s)", s.title, s.sections, s.chunks);
            }
        }
        Command::Serve { docs, .. } => {
            if let Some(dir) = docs {
                match engine.ingest_folder(&expand_path(&dir), IngestOptions::default()).await {
                    Ok(summary) => tracing::info!(
                        "📦 Loaded {} course(s) with {} chunk(s)",
                        summary.sources_added,
                        summary.chunks_added
                    ),
                    Err(e) => tracing::warn!("⚠️ Could not load documents from {dir}: {e}"),
                }
            }
            lectern_gateway::start(&config.gateway, Arc::new(engine)).await?;
        }
    }

    Ok(())
}
