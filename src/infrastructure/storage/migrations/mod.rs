//! Versioned schema migrations for the experiment store
//!
//! Applied versions are tracked in `_migrations`. Each step runs its SQL and
//! its bookkeeping row in one transaction while holding an advisory lock, so
//! two instances starting together cannot apply the same version twice.

use sqlx::postgres::PgPool;
use tracing::info;

use crate::domain::DomainError;

/// Key for `pg_advisory_xact_lock`, shared by every instance of the service
const MIGRATION_LOCK_KEY: i64 = 0x0ab7_e57;

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub up: String,
    pub down: String,
}

impl Migration {
    pub fn new(
        version: i64,
        description: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            version,
            description: description.into(),
            up: up.into(),
            down: down.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
    migrations: Vec<Migration>,
}

impl PostgresMigrator {
    /// Migrator over the experiment schema
    pub fn new(pool: PgPool) -> Self {
        Self::with_migrations(pool, experiment_migrations())
    }

    pub fn with_migrations(pool: PgPool, mut migrations: Vec<Migration>) -> Self {
        migrations.sort_by_key(|m| m.version);
        Self { pool, migrations }
    }

    /// Applies every pending migration in version order
    ///
    /// Returns the versions applied by this call.
    pub async fn migrate_up(&self) -> Result<Vec<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        let mut applied = Vec::new();
        for migration in &self.migrations {
            if self.step(migration, Direction::Up).await? {
                info!(
                    version = migration.version,
                    description = %migration.description,
                    "Applied migration"
                );
                applied.push(migration.version);
            }
        }

        Ok(applied)
    }

    /// Reverts the most recently applied migration, if any
    pub async fn revert_latest(&self) -> Result<Option<i64>, DomainError> {
        let Some(version) = self.current_version().await? else {
            return Ok(None);
        };

        let migration = self
            .migrations
            .iter()
            .find(|m| m.version == version)
            .ok_or_else(|| DomainError::internal(format!("Unknown migration version {}", version)))?;

        if self.step(migration, Direction::Down).await? {
            info!(version, description = %migration.description, "Reverted migration");
        }

        Ok(Some(version))
    }

    /// Latest applied version, `None` on an empty database
    pub async fn current_version(&self) -> Result<Option<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(version) FROM _migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                DomainError::store_unavailable(format!("Failed to read migration version: {}", e))
            })
    }

    /// Concurrent `CREATE TABLE IF NOT EXISTS` can still collide in the
    /// catalog, so this also runs under the advisory lock
    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        let fail = |e: sqlx::Error| {
            DomainError::store_unavailable(format!("Failed to create migrations table: {}", e))
        };

        let mut tx = self.pool.begin().await.map_err(fail)?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(fail)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(fail)?;

        tx.commit().await.map_err(fail)
    }

    /// Runs one migration in one direction
    ///
    /// Returns false when another instance got there first.
    async fn step(&self, migration: &Migration, direction: Direction) -> Result<bool, DomainError> {
        let fail = |what: &str, e: sqlx::Error| {
            DomainError::internal(format!(
                "Failed to {} migration {}: {}",
                what, migration.version, e
            ))
        };

        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::store_unavailable(format!("Failed to begin migration: {}", e))
        })?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| fail("lock", e))?;

        let applied = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)",
        )
        .bind(migration.version)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| fail("check", e))?;

        let (sql, bookkeeping) = match (direction, applied) {
            (Direction::Up, false) => (
                &migration.up,
                "INSERT INTO _migrations (version, description) VALUES ($1, $2)",
            ),
            (Direction::Down, true) => (
                &migration.down,
                "DELETE FROM _migrations WHERE version = $1 AND description = $2",
            ),
            _ => return Ok(false),
        };

        // raw_sql allows several statements per migration
        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| fail("run", e))?;

        sqlx::query(bookkeeping)
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| fail("record", e))?;

        tx.commit().await.map_err(|e| {
            DomainError::store_unavailable(format!(
                "Failed to commit migration {}: {}",
                migration.version, e
            ))
        })?;

        Ok(true)
    }
}

/// Schema for experiments and their variations
pub fn experiment_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create experiments table",
            r#"
            CREATE TABLE IF NOT EXISTS experiments (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE CHECK (btrim(name) <> ''),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
            "DROP TABLE IF EXISTS experiments;",
        ),
        Migration::new(
            2,
            "Create variations table",
            r#"
            CREATE TABLE IF NOT EXISTS variations (
                id BIGSERIAL PRIMARY KEY,
                experiment_id BIGINT NOT NULL REFERENCES experiments(id) ON DELETE CASCADE,
                name VARCHAR(255) NOT NULL CHECK (btrim(name) <> ''),
                position INT NOT NULL,
                participants BIGINT NOT NULL DEFAULT 0 CHECK (participants >= 0),
                conversions BIGINT NOT NULL DEFAULT 0 CHECK (conversions >= 0),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (experiment_id, name)
            );
            CREATE INDEX IF NOT EXISTS idx_variations_experiment_id
                ON variations(experiment_id, position);
            "#,
            "DROP TABLE IF EXISTS variations;",
        ),
    ]
}
