mod db;
mod diagnostics;
mod jobs;
mod worker;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::db::DbCommands;
use crate::jobs::JobArgs;

#[derive(Debug, Parser)]
#[command(name = "supercat")]
#[command(about = "Supermarket catalog normalization pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run one scrape job immediately and print its result
    Run {
        #[command(flatten)]
        job: JobArgs,

        /// Serve pages from a directory of HTML files and keep the catalog in
        /// memory instead of hitting the retailer and the database
        #[arg(long)]
        fixtures: Option<PathBuf>,
    },
    /// Add a scrape job to the queue
    Enqueue {
        #[command(flatten)]
        job: JobArgs,
    },
    /// Process queued jobs
    Worker {
        /// Concurrent job slots (defaults to SUPERCAT_WORKER_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Exit once the queue is empty instead of polling
        #[arg(long)]
        once: bool,
    },
    /// Show which brand a product title resolves to
    MatchBrand {
        #[arg(long)]
        title: String,

        /// Retailer key, enables the retailer's title format
        #[arg(long)]
        store: Option<String>,
    },
    /// Show how a retailer category maps onto the master taxonomy
    MapCategory {
        #[arg(long)]
        store: String,

        #[arg(long)]
        name: String,

        /// Ancestor names separated by `/`, root first
        #[arg(long)]
        path: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("supercat: no command given, see --help");
        return Ok(());
    };

    let config = supercat_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Db { command } => db::run_db_command(&config, command).await,
        Commands::Run { job, fixtures } => jobs::run_job(&config, &job, fixtures.as_deref()).await,
        Commands::Enqueue { job } => jobs::enqueue(&config, &job).await,
        Commands::Worker { concurrency, once } => {
            worker::run_worker(&config, concurrency, once).await
        }
        Commands::MatchBrand { title, store } => {
            diagnostics::match_brand(&config, &title, store.as_deref()).await
        }
        Commands::MapCategory { store, name, path } => {
            diagnostics::map_category(&config, &store, &name, path.as_deref()).await
        }
    }
}

#[cfg(test)]
mod tests;
