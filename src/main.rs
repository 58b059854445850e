//! # Research Digest CLI (`rdigest`)
//!
//! Ingests fresh research PDFs into a summary index and writes a weekly
//! digest that relates the week's papers to earlier ones.
//!
//! ## Usage
//!
//! ```bash
//! rdigest --config ./config/rdigest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rdigest init` | Create the SQLite database and schema |
//! | `rdigest ingest` | Summarize papers modified in the "new" window |
//! | `rdigest digest` | Write the weekly report for the "week" window |
//! | `rdigest run` | Ingest, then digest |
//! | `rdigest similar "<text>"` | Show the nearest stored summaries |
//! | `rdigest stats` | Show what the index holds |
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use research_digest::config::{load_config, Config};
use research_digest::digest::DigestOutcome;
use research_digest::ingest::IngestStats;
use research_digest::run::{self, Stage};
use research_digest::{migrate, similar, stats};

/// Research Digest: daily paper summaries and a weekly research report.
#[derive(Parser)]
#[command(name = "rdigest", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rdigest.toml`. When the file does not exist,
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/rdigest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and schema. Safe to run repeatedly.
    Init,

    /// Summarize abstracts of newly modified papers into the index.
    Ingest {
        /// List what qualifies without contacting backends or writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Compile the weekly report from this week's papers.
    Digest {
        /// List what qualifies without contacting backends or writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Ingest, then compile the weekly report.
    Run {
        /// List what qualifies without contacting backends or writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show stored summaries nearest to the given text.
    Similar {
        text: String,

        /// Number of results (defaults to `[retrieval].similar_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show index statistics.
    Stats,
}

fn resolve_config(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        warn!(path = %path.display(), "config file not found; using defaults");
        Ok(Config::minimal())
    }
}

fn print_ingest(stats: &IngestStats) {
    println!("ingest");
    println!("  scanned: {}", stats.scanned);
    println!("  new: {}", stats.new);
    println!("  no abstract: {}", stats.no_abstract);
    println!("  stored: {}", stats.stored);
    println!("  failed: {}", stats.failed);
}

fn print_digest(outcome: &DigestOutcome) {
    println!("digest");
    match outcome {
        DigestOutcome::NoInput { scanned } => {
            println!("  scanned: {}", scanned);
            println!("  abstracts: 0");
            println!("  report: not written");
        }
        DigestOutcome::DryRun { scanned, abstracts } => {
            println!("  scanned: {}", scanned);
            println!("  abstracts: {}", abstracts);
            println!("  report: dry run");
        }
        DigestOutcome::Written {
            scanned,
            abstracts,
            similar,
            path,
        } => {
            println!("  scanned: {}", scanned);
            println!("  abstracts: {}", abstracts);
            println!("  similar: {}", similar);
            println!("  report: {}", path.display());
        }
    }
}

async fn run_stage(cfg: &Config, stage: Stage, dry_run: bool) -> Result<()> {
    let report = run::run(cfg, stage, dry_run).await?;
    if let Some(stats) = &report.ingest {
        print_ingest(stats);
    }
    if let Some(outcome) = &report.digest {
        print_digest(outcome);
    }
    if dry_run {
        println!("dry run: nothing written");
    }
    println!("ok");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = resolve_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { dry_run } => run_stage(&cfg, Stage::Ingest, dry_run).await?,
        Commands::Digest { dry_run } => run_stage(&cfg, Stage::Digest, dry_run).await?,
        Commands::Run { dry_run } => run_stage(&cfg, Stage::All, dry_run).await?,
        Commands::Similar { text, limit } => {
            similar::run_similar(&cfg, &text, limit).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
