//! # Settings search indexer CLI (`sidx`)
//!
//! The `sidx` binary crawls settings contributors on disk and maintains the
//! SQLite search index built from them.
//!
//! ## Usage
//!
//! ```bash
//! sidx --config ./config/sidx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sidx init` | Create the SQLite database and run schema migrations |
//! | `sidx contributors` | List discovered contributors with trust and health |
//! | `sidx crawl` | Collect, convert and store index rows |
//! | `sidx stats` | Summarize the stored index |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! sidx init --config ./config/sidx.toml
//!
//! # Preview what a crawl would index, without writing
//! sidx crawl --dry-run --config ./config/sidx.toml
//!
//! # Rebuild the whole index
//! sidx crawl --full --config ./config/sidx.toml
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG`
//! (default `settings_search=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use settings_search::{config, contributors, indexer, migrate, stats};

/// Settings search indexer: crawls settings contributors and maintains a
/// normalized, locale-aware search index.
#[derive(Parser)]
#[command(
    name = "sidx",
    about = "Settings search indexer: crawls settings contributors into a search index",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "./config/sidx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and apply the schema.
    Init,

    /// List discovered contributors.
    Contributors,

    /// Run one crawl cycle.
    Crawl {
        /// Rebuild the index even if nothing it was built against changed.
        #[arg(long)]
        full: bool,

        /// Collect and convert, print the rows, write nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print index statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("settings_search=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Contributors => {
            contributors::list_contributors(&cfg)?;
        }
        Commands::Crawl { full, dry_run } => {
            indexer::run_crawl(&cfg, full, dry_run).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
