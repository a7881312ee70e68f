use sqlx::PgPool;
use tracing::instrument;

use crate::db::{DataSource, DbError, StorageHistory};

#[derive(Clone)]
pub struct StorageHistoryRepository {
    pool: PgPool,
}

impl StorageHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts on `(facility_code, year, month)`.
    #[instrument(skip(self))]
    pub async fn record(
        &self,
        facility_code: &str,
        year: i32,
        month: i32,
        opening_volume_m3: f64,
        closing_volume_m3: f64,
        data_source: DataSource,
    ) -> Result<StorageHistory, DbError> {
        let row = sqlx::query_as!(
            StorageHistory,
            r#"
            INSERT INTO storage_history
                (facility_code, year, month, opening_volume_m3, closing_volume_m3, data_source)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (facility_code, year, month) DO UPDATE
                SET opening_volume_m3 = EXCLUDED.opening_volume_m3,
                    closing_volume_m3 = EXCLUDED.closing_volume_m3,
                    data_source = EXCLUDED.data_source
            RETURNING id, facility_code, year, month, opening_volume_m3, closing_volume_m3,
                      delta_volume_m3, data_source as "data_source: _", created_at
            "#,
            facility_code,
            year,
            month,
            opening_volume_m3,
            closing_volume_m3,
            data_source as _,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn get(
        &self,
        facility_code: &str,
        year: i32,
        month: i32,
    ) -> Result<Option<StorageHistory>, DbError> {
        let row = sqlx::query_as!(
            StorageHistory,
            r#"
            SELECT id, facility_code, year, month, opening_volume_m3, closing_volume_m3,
                   delta_volume_m3, data_source as "data_source: _", created_at
            FROM storage_history
            WHERE facility_code = $1 AND year = $2 AND month = $3
            "#,
            facility_code,
            year,
            month
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn list_for_facility(
        &self,
        facility_code: &str,
    ) -> Result<Vec<StorageHistory>, DbError> {
        let rows = sqlx::query_as!(
            StorageHistory,
            r#"
            SELECT id, facility_code, year, month, opening_volume_m3, closing_volume_m3,
                   delta_volume_m3, data_source as "data_source: _", created_at
            FROM storage_history
            WHERE facility_code = $1
            ORDER BY year, month
            "#,
            facility_code
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
