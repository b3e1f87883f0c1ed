//! Migrate command - applies PostgreSQL migrations and exits

use clap::Args;
use tracing::info;

use crate::infrastructure::logging::init_logging;
use crate::infrastructure::storage::{connect_pool, PostgresConfig, PostgresMigrator};

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Database URL, overriding `storage.database_url` and `DATABASE_URL`
    #[arg(long)]
    pub database_url: Option<String>,

    /// Revert the most recently applied migration instead of applying
    #[arg(long)]
    pub revert: bool,
}

/// Apply all pending migrations, or revert the latest one
pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = super::serve::load_config();
    init_logging(&config.logging)?;

    let url = args
        .database_url
        .or_else(|| config.storage.database_url.clone())
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or_else(|| anyhow::anyhow!("--database-url or DATABASE_URL is required"))?;

    let pool = connect_pool(&PostgresConfig::new(url).with_max_connections(1)).await?;

    let migrator = PostgresMigrator::new(pool.clone());

    if args.revert {
        if migrator.revert_latest().await?.is_none() {
            info!("No applied migrations to revert");
        }
    } else {
        let applied = migrator.migrate_up().await?;
        info!(count = applied.len(), "Migrations applied");
    }

    let version = migrator.current_version().await?;
    info!(version = ?version, "Database schema version");

    pool.close().await;
    Ok(())
}
