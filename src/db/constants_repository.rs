use sqlx::PgPool;
use tracing::{info, instrument};

use crate::db::{DbError, SystemConstant};

/// `(key, value, min, max, unit, category)` seeded on first boot when the
/// table is empty, matching the reference implementation's known constants.
pub const DEFAULT_CONSTANTS: &[(&str, f64, Option<f64>, Option<f64>, &str, &str)] = &[
    ("balance_error_threshold_pct", 5.0, Some(0.0), Some(100.0), "%", "balance"),
    ("seepage_rate_lined_pct", 0.5, Some(0.0), Some(100.0), "%", "seepage"),
    ("seepage_rate_unlined_pct", 2.0, Some(0.0), Some(100.0), "%", "seepage"),
    ("tailings_solids_density", 2.7, Some(0.1), Some(10.0), "t/m3", "tailings"),
    ("rwd_intensity_tolerance_pct", 5.0, Some(0.0), Some(100.0), "%", "kpi"),
];

#[derive(Clone)]
pub struct ConstantsRepository {
    pool: PgPool,
}

impl ConstantsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent: inserts the default payload only if the table is
    /// currently empty.
    #[instrument(skip(self))]
    pub async fn seed_defaults(&self) -> Result<(), DbError> {
        let count = sqlx::query_scalar!("SELECT COUNT(*) FROM system_constants")
            .fetch_one(&self.pool)
            .await?
            .unwrap_or(0);
        if count > 0 {
            return Ok(());
        }
        for (key, value, min, max, unit, category) in DEFAULT_CONSTANTS {
            sqlx::query!(
                r#"
                INSERT INTO system_constants
                    (constant_key, constant_value, min_value, max_value, unit, category, editable)
                VALUES ($1, $2, $3, $4, $5, $6, true)
                ON CONFLICT (constant_key) DO NOTHING
                "#,
                key,
                value,
                min,
                max,
                *unit,
                *category,
            )
            .execute(&self.pool)
            .await?;
        }
        info!(count = DEFAULT_CONSTANTS.len(), "seeded default system constants");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<SystemConstant>, DbError> {
        let row = sqlx::query_as!(
            SystemConstant,
            r#"
            SELECT id, constant_key, constant_value, min_value, max_value, unit,
                   category, editable, updated_at
            FROM system_constants
            WHERE constant_key = $1
            "#,
            key
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn get_value_or(&self, key: &str, default: f64) -> f64 {
        match self.get(key).await {
            Ok(Some(c)) => c.constant_value,
            _ => default,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<SystemConstant>, DbError> {
        let rows = sqlx::query_as!(
            SystemConstant,
            r#"
            SELECT id, constant_key, constant_value, min_value, max_value, unit,
                   category, editable, updated_at
            FROM system_constants
            ORDER BY category, constant_key
            "#
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Writes within `[min_value, max_value]` only; appends an audit row.
    #[instrument(skip(self))]
    pub async fn set(
        &self,
        key: &str,
        new_value: f64,
        updated_by: Option<&str>,
    ) -> Result<SystemConstant, DbError> {
        let existing = self
            .get(key)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("constant {key}")))?;

        if let Some(min) = existing.min_value {
            if new_value < min {
                return Err(DbError::InvariantViolation(format!(
                    "{key} must be >= {min}"
                )));
            }
        }
        if let Some(max) = existing.max_value {
            if new_value > max {
                return Err(DbError::InvariantViolation(format!(
                    "{key} must be <= {max}"
                )));
            }
        }

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as!(
            SystemConstant,
            r#"
            UPDATE system_constants
            SET constant_value = $2, updated_at = now()
            WHERE constant_key = $1
            RETURNING id, constant_key, constant_value, min_value, max_value, unit,
                      category, editable, updated_at
            "#,
            key,
            new_value
        )
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query!(
            r#"
            INSERT INTO constants_audit (constant_key, old_value, new_value, updated_by)
            VALUES ($1, $2, $3, $4)
            "#,
            key,
            existing.constant_value,
            new_value,
            updated_by,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }
}
