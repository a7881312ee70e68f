use sqlx::PgPool;
use tracing::instrument;

use crate::db::{DbError, FacilityTransfer, TransferMethod};

#[derive(Clone)]
pub struct FacilityTransferRepository {
    pool: PgPool,
}

impl FacilityTransferRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn record(
        &self,
        source_facility_code: &str,
        dest_facility_code: &str,
        year: i32,
        month: i32,
        volume_m3: f64,
        transfer_method: TransferMethod,
        notes: Option<&str>,
    ) -> Result<FacilityTransfer, DbError> {
        let row = sqlx::query_as!(
            FacilityTransfer,
            r#"
            INSERT INTO facility_transfers
                (source_facility_code, dest_facility_code, year, month, volume_m3, transfer_method, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, source_facility_code, dest_facility_code, year, month, volume_m3,
                      transfer_method as "transfer_method: _", notes, created_at
            "#,
            source_facility_code,
            dest_facility_code,
            year,
            month,
            volume_m3,
            transfer_method as _,
            notes,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// All transfers recorded for a given period, for reporting and
    /// audit purposes; transfer volumes are not netted into the balance
    /// engine's own inflow/outflow accounting.
    #[instrument(skip(self))]
    pub async fn list_for_period(
        &self,
        year: i32,
        month: i32,
    ) -> Result<Vec<FacilityTransfer>, DbError> {
        let rows = sqlx::query_as!(
            FacilityTransfer,
            r#"
            SELECT id, source_facility_code, dest_facility_code, year, month, volume_m3,
                   transfer_method as "transfer_method: _", notes, created_at
            FROM facility_transfers
            WHERE year = $1 AND month = $2
            ORDER BY id
            "#,
            year,
            month
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn list_for_facility(
        &self,
        facility_code: &str,
    ) -> Result<Vec<FacilityTransfer>, DbError> {
        let rows = sqlx::query_as!(
            FacilityTransfer,
            r#"
            SELECT id, source_facility_code, dest_facility_code, year, month, volume_m3,
                   transfer_method as "transfer_method: _", notes, created_at
            FROM facility_transfers
            WHERE source_facility_code = $1 OR dest_facility_code = $1
            ORDER BY year, month
            "#,
            facility_code
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
