//! PostgreSQL implementation of the experiment store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::debug;

use crate::domain::experiment::{
    Experiment, ExperimentId, ExperimentStore, NewExperiment, Variation, VariationId,
};
use crate::domain::DomainError;

const SELECT_EXPERIMENTS_WITH_VARIATIONS: &str = r#"
    SELECT e.id, e.name, e.created_at,
           v.id AS variation_id, v.name AS variation_name,
           v.participants, v.conversions, v.created_at AS variation_created_at
    FROM experiments e
    LEFT JOIN variations v ON v.experiment_id = e.id
"#;

const SELECT_VARIATION: &str = r#"
    SELECT id, experiment_id, name, participants, conversions, created_at
    FROM variations
"#;

/// Experiment store backed by the `experiments` and `variations` tables
///
/// Registration runs in one transaction. Counter increments are single
/// `UPDATE ... RETURNING` statements, so Postgres row locks scope contention
/// to one variation.
#[derive(Debug, Clone)]
pub struct PostgresExperimentStore {
    pool: PgPool,
}

impl PostgresExperimentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn increment(&self, column: &str, id: &VariationId) -> Result<u64, DomainError> {
        let query = format!(
            "UPDATE variations SET {column} = {column} + 1 WHERE id = $1 RETURNING {column}"
        );

        let value: Option<i64> = sqlx::query_scalar(&query)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to increment counter", e))?;

        match value {
            Some(count) => to_count(count),
            None => Err(DomainError::not_found(format!(
                "Variation '{}' not found",
                id
            ))),
        }
    }
}

/// Maps driver errors onto the domain taxonomy
fn map_sqlx_error(context: &str, error: sqlx::Error) -> DomainError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DomainError::duplicate_name(format!("{}: {}", context, db.message()))
        }
        sqlx::Error::Database(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => {
            DomainError::internal(format!("{}: {}", context, error))
        }
        _ => DomainError::store_unavailable(format!("{}: {}", context, error)),
    }
}

fn to_count(value: i64) -> Result<u64, DomainError> {
    u64::try_from(value)
        .map_err(|_| DomainError::internal(format!("Negative counter value: {}", value)))
}

fn experiment_id(raw: i64) -> Result<ExperimentId, DomainError> {
    ExperimentId::new(raw).map_err(|e| DomainError::internal(e.to_string()))
}

fn variation_id(raw: i64) -> Result<VariationId, DomainError> {
    VariationId::new(raw).map_err(|e| DomainError::internal(e.to_string()))
}

fn variation_from_row(row: &PgRow) -> Result<Variation, DomainError> {
    let decode = |e: sqlx::Error| map_sqlx_error("Failed to decode variation", e);

    let id: i64 = row.try_get("id").map_err(decode)?;
    let experiment: i64 = row.try_get("experiment_id").map_err(decode)?;
    let name: String = row.try_get("name").map_err(decode)?;
    let participants: i64 = row.try_get("participants").map_err(decode)?;
    let conversions: i64 = row.try_get("conversions").map_err(decode)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;

    Ok(
        Variation::new(variation_id(id)?, experiment_id(experiment)?, name)
            .with_counts(to_count(participants)?, to_count(conversions)?)
            .with_created_at(created_at),
    )
}

/// Folds joined experiment/variation rows into experiments
///
/// Rows must be ordered by experiment, then by variation position.
fn experiments_from_rows(rows: &[PgRow]) -> Result<Vec<Experiment>, DomainError> {
    let decode = |e: sqlx::Error| map_sqlx_error("Failed to decode experiment", e);
    let mut experiments: Vec<Experiment> = Vec::new();

    for row in rows {
        let id = experiment_id(row.try_get("id").map_err(decode)?)?;

        let is_new = experiments.last().is_none_or(|last| last.id() != id);
        if is_new {
            let name: String = row.try_get("name").map_err(decode)?;
            let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;
            experiments.push(Experiment::new(id, name).with_created_at(created_at));
        }

        let Some(raw_variation_id) = row
            .try_get::<Option<i64>, _>("variation_id")
            .map_err(decode)?
        else {
            continue;
        };

        let name: String = row.try_get("variation_name").map_err(decode)?;
        let participants: i64 = row.try_get("participants").map_err(decode)?;
        let conversions: i64 = row.try_get("conversions").map_err(decode)?;
        let created_at: DateTime<Utc> = row.try_get("variation_created_at").map_err(decode)?;

        let variation = Variation::new(variation_id(raw_variation_id)?, id, name)
            .with_counts(to_count(participants)?, to_count(conversions)?)
            .with_created_at(created_at);

        if let Some(last) = experiments.pop() {
            experiments.push(last.with_variation(variation));
        }
    }

    Ok(experiments)
}

#[async_trait]
impl ExperimentStore for PostgresExperimentStore {
    async fn create_experiment(&self, new: NewExperiment) -> Result<Experiment, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to begin transaction", e))?;

        let row = sqlx::query("INSERT INTO experiments (name) VALUES ($1) RETURNING id, created_at")
            .bind(new.name())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match map_sqlx_error("Failed to create experiment", e) {
                DomainError::DuplicateName { .. } => DomainError::duplicate_name(format!(
                    "Experiment '{}' already exists",
                    new.name()
                )),
                other => other,
            })?;

        let decode = |e: sqlx::Error| map_sqlx_error("Failed to decode experiment", e);
        let id = experiment_id(row.try_get("id").map_err(decode)?)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;

        let mut experiment = Experiment::new(id, new.name()).with_created_at(created_at);

        for (position, name) in new.variation_names().iter().enumerate() {
            let row = sqlx::query(
                r#"
                INSERT INTO variations (experiment_id, name, position)
                VALUES ($1, $2, $3)
                RETURNING id, experiment_id, name, participants, conversions, created_at
                "#,
            )
            .bind(id.value())
            .bind(name)
            .bind(position as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match map_sqlx_error("Failed to create variation", e) {
                DomainError::DuplicateName { message } => DomainError::invalid_input(message),
                other => other,
            })?;

            experiment = experiment.with_variation(variation_from_row(&row)?);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit experiment", e))?;

        debug!(experiment_id = %id, "Experiment row committed");
        Ok(experiment)
    }

    async fn get_experiment(&self, id: &ExperimentId) -> Result<Option<Experiment>, DomainError> {
        let query = format!(
            "{} WHERE e.id = $1 ORDER BY v.position, v.id",
            SELECT_EXPERIMENTS_WITH_VARIATIONS
        );

        let rows = sqlx::query(&query)
            .bind(id.value())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to get experiment", e))?;

        Ok(experiments_from_rows(&rows)?.into_iter().next())
    }

    async fn list_experiments(&self) -> Result<Vec<Experiment>, DomainError> {
        let query = format!(
            "{} ORDER BY e.id, v.position, v.id",
            SELECT_EXPERIMENTS_WITH_VARIATIONS
        );

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to list experiments", e))?;

        experiments_from_rows(&rows)
    }

    async fn get_variation(&self, id: &VariationId) -> Result<Option<Variation>, DomainError> {
        let query = format!("{} WHERE id = $1", SELECT_VARIATION);

        let row = sqlx::query(&query)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to get variation", e))?;

        row.as_ref().map(variation_from_row).transpose()
    }

    async fn list_variations(
        &self,
        experiment_id: &ExperimentId,
    ) -> Result<Vec<Variation>, DomainError> {
        let query = format!(
            "{} WHERE experiment_id = $1 ORDER BY position, id",
            SELECT_VARIATION
        );

        let rows = sqlx::query(&query)
            .bind(experiment_id.value())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to list variations", e))?;

        rows.iter().map(variation_from_row).collect()
    }

    async fn increment_participants(&self, id: &VariationId) -> Result<u64, DomainError> {
        self.increment("participants", id).await
    }

    async fn increment_conversions(&self, id: &VariationId) -> Result<u64, DomainError> {
        self.increment("conversions", id).await
    }

    async fn health_check(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::store_unavailable(format!("Database health check failed: {}", e))
            })?;

        Ok(())
    }
}
