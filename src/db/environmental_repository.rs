use sqlx::PgPool;
use tracing::instrument;

use crate::db::{DbError, EnvironmentalMonthly};

#[derive(Clone)]
pub struct EnvironmentalRepository {
    pool: PgPool,
}

impl EnvironmentalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, year: i32, month: i32) -> Result<Option<EnvironmentalMonthly>, DbError> {
        let row = sqlx::query_as!(
            EnvironmentalMonthly,
            r#"
            SELECT id, year, month, rainfall_mm, evaporation_mm, created_at, updated_at
            FROM environmental_data
            WHERE year = $1 AND month = $2
            "#,
            year,
            month
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Upserts and, when an existing row changes, appends one audit entry
    /// per changed field.
    #[instrument(skip(self))]
    pub async fn upsert(
        &self,
        year: i32,
        month: i32,
        rainfall_mm: f64,
        evaporation_mm: f64,
    ) -> Result<EnvironmentalMonthly, DbError> {
        let existing = self.get(year, month).await?;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as!(
            EnvironmentalMonthly,
            r#"
            INSERT INTO environmental_data (year, month, rainfall_mm, evaporation_mm)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (year, month) DO UPDATE
                SET rainfall_mm = EXCLUDED.rainfall_mm,
                    evaporation_mm = EXCLUDED.evaporation_mm,
                    updated_at = now()
            RETURNING id, year, month, rainfall_mm, evaporation_mm, created_at, updated_at
            "#,
            year,
            month,
            rainfall_mm,
            evaporation_mm,
        )
        .fetch_one(&mut *tx)
        .await?;

        if let Some(prev) = existing {
            if prev.rainfall_mm != rainfall_mm {
                sqlx::query!(
                    r#"
                    INSERT INTO environmental_data_audit
                        (environmental_id, field_name, old_value, new_value)
                    VALUES ($1, 'rainfall_mm', $2, $3)
                    "#,
                    row.id,
                    prev.rainfall_mm,
                    rainfall_mm,
                )
                .execute(&mut *tx)
                .await?;
            }
            if prev.evaporation_mm != evaporation_mm {
                sqlx::query!(
                    r#"
                    INSERT INTO environmental_data_audit
                        (environmental_id, field_name, old_value, new_value)
                    VALUES ($1, 'evaporation_mm', $2, $3)
                    "#,
                    row.id,
                    prev.evaporation_mm,
                    evaporation_mm,
                )
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(row)
    }
}
