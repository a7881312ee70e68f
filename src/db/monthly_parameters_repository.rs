use sqlx::PgPool;
use tracing::instrument;

use crate::db::{DbError, MonthlyParameters};

#[derive(Clone)]
pub struct MonthlyParametersRepository {
    pool: PgPool,
}

impl MonthlyParametersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn get_by_period(
        &self,
        facility_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Option<MonthlyParameters>, DbError> {
        let row = sqlx::query_as!(
            MonthlyParameters,
            r#"
            SELECT id, facility_id, year, month, total_inflows_m3, total_outflows_m3,
                   created_at, updated_at
            FROM facility_monthly_parameters
            WHERE facility_id = $1 AND year = $2 AND month = $3
            "#,
            facility_id,
            year,
            month
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn upsert(
        &self,
        facility_id: i64,
        year: i32,
        month: i32,
        total_inflows_m3: f64,
        total_outflows_m3: f64,
    ) -> Result<MonthlyParameters, DbError> {
        if total_inflows_m3 < 0.0 || total_outflows_m3 < 0.0 {
            return Err(DbError::InvariantViolation(
                "monthly totals must be >= 0".into(),
            ));
        }
        let row = sqlx::query_as!(
            MonthlyParameters,
            r#"
            INSERT INTO facility_monthly_parameters
                (facility_id, year, month, total_inflows_m3, total_outflows_m3)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (facility_id, year, month) DO UPDATE
                SET total_inflows_m3 = EXCLUDED.total_inflows_m3,
                    total_outflows_m3 = EXCLUDED.total_outflows_m3,
                    updated_at = now()
            RETURNING id, facility_id, year, month, total_inflows_m3, total_outflows_m3,
                      created_at, updated_at
            "#,
            facility_id,
            year,
            month,
            total_inflows_m3,
            total_outflows_m3,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn delete_for_facility(&self, facility_id: i64) -> Result<(), DbError> {
        sqlx::query!(
            "DELETE FROM facility_monthly_parameters WHERE facility_id = $1",
            facility_id
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
