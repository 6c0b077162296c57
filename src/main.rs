//! # Inkpress CLI
//!
//! Commands for database initialization, content sync, seed generation, and
//! running the HTTP API.
//!
//! ```bash
//! inkpress --config ./config/inkpress.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `inkpress init` | Create the SQLite database and run schema migrations |
//! | `inkpress sync` | Ingest post folders into the database |
//! | `inkpress serve` | Start the JSON API server |
//! | `inkpress seed` | Emit a `.sql` seed file |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use inkpress::{config, db, migrate, seed, server, store::SqliteStore, sync};

/// Inkpress — Markdown blog ingestion and serving.
#[derive(Parser)]
#[command(
    name = "inkpress",
    about = "Inkpress — syncs Markdown post folders into SQLite and serves them over a JSON API",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/inkpress.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the blogs, blog_pages, and
    /// images tables. Idempotent.
    Init,

    /// Sync post folders into the database.
    ///
    /// Walks the configured blogs directory, normalizes each folder's
    /// Markdown, and upserts posts and pages. Unchanged folders are
    /// skipped via a stored content hash.
    Sync {
        /// Ignore stored content hashes and re-upsert every folder.
        #[arg(long)]
        full: bool,

        /// Show what would be synced without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of folders to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Start the JSON API server.
    Serve,

    /// Generate a seed-data .sql file (never writes the database).
    Seed {
        /// Number of posts to generate.
        #[arg(long, default_value_t = 10)]
        count: usize,

        /// Percentage of multi-page posts (0-100).
        #[arg(long, default_value_t = 40)]
        multipage: u8,

        /// Emit DELETE statements before the inserts.
        #[arg(long)]
        clean: bool,

        /// Output path for the generated SQL.
        #[arg(long, default_value = "seed.sql")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkpress=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Sync { full, dry_run, limit } => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            let store = SqliteStore::new(pool.clone());
            sync::run_sync(&cfg, &store, sync::SyncOptions { full, dry_run, limit }).await?;
            pool.close().await;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Seed {
            count,
            multipage,
            clean,
            out,
        } => {
            seed::write_seed_file(
                &out,
                &seed::SeedOptions {
                    count,
                    multipage_percent: multipage,
                    clean,
                },
            )?;
        }
    }

    Ok(())
}
