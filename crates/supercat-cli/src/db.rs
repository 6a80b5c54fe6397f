//! `db` subcommands.

use clap::Subcommand;
use sqlx::PgPool;
use supercat_core::{load_category_tables, AppConfig};

#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check the database is reachable
    Ping,
    /// Insert or refresh the master taxonomy from the category tables file
    SeedCategories,
}

pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let pool_config = supercat_db::PoolConfig::from_app_config(config);
    let pool = supercat_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(pool)
}

pub(crate) async fn run_db_command(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = connect(config).await?;

    match command {
        DbCommands::Migrate => {
            let applied = supercat_db::run_migrations(&pool).await?;
            tracing::info!(applied, "migrations complete");
            println!("applied {applied} migration(s)");
        }
        DbCommands::Ping => {
            supercat_db::health_check(&pool).await?;
            println!("database ok");
        }
        DbCommands::SeedCategories => {
            let tables = load_category_tables(&config.category_tables_path)?;
            let seeds = tables.seed_categories();
            let count = supercat_db::seed_master_categories(&pool, &seeds).await?;
            println!("seeded {count} master categories");
        }
    }

    pool.close().await;
    Ok(())
}
