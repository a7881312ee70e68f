use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::db::DbError;
use crate::domain::{FacilityStatus, NewStorageFacility, StorageFacility};

#[derive(Clone)]
pub struct FacilityRepository {
    pool: PgPool,
}

impl FacilityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<StorageFacility>, DbError> {
        let facilities = sqlx::query_as!(
            StorageFacility,
            r#"
            SELECT id, code, name, facility_type as "facility_type: _",
                   capacity_m3, surface_area_m2, current_volume_m3, is_lined,
                   status as "status: _", notes, created_at, updated_at
            FROM storage_facilities
            ORDER BY code
            "#
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(facilities)
    }

    #[instrument(skip(self))]
    pub async fn list_by_status(
        &self,
        status: FacilityStatus,
    ) -> Result<Vec<StorageFacility>, DbError> {
        let facilities = sqlx::query_as!(
            StorageFacility,
            r#"
            SELECT id, code, name, facility_type as "facility_type: _",
                   capacity_m3, surface_area_m2, current_volume_m3, is_lined,
                   status as "status: _", notes, created_at, updated_at
            FROM storage_facilities
            WHERE status = $1
            ORDER BY code
            "#,
            status as FacilityStatus
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(facilities)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<StorageFacility>, DbError> {
        let facility = sqlx::query_as!(
            StorageFacility,
            r#"
            SELECT id, code, name, facility_type as "facility_type: _",
                   capacity_m3, surface_area_m2, current_volume_m3, is_lined,
                   status as "status: _", notes, created_at, updated_at
            FROM storage_facilities
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(facility)
    }

    #[instrument(skip(self), fields(%code))]
    pub async fn get_by_code(&self, code: &str) -> Result<Option<StorageFacility>, DbError> {
        let facility = sqlx::query_as!(
            StorageFacility,
            r#"
            SELECT id, code, name, facility_type as "facility_type: _",
                   capacity_m3, surface_area_m2, current_volume_m3, is_lined,
                   status as "status: _", notes, created_at, updated_at
            FROM storage_facilities
            WHERE code = $1
            "#,
            code
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(facility)
    }

    #[instrument(skip(self, facility), fields(code = %facility.code))]
    pub async fn create(&self, facility: NewStorageFacility) -> Result<StorageFacility, DbError> {
        if self.get_by_code(&facility.code).await?.is_some() {
            return Err(DbError::DuplicateCode(facility.code));
        }

        let created = sqlx::query_as!(
            StorageFacility,
            r#"
            INSERT INTO storage_facilities
                (code, name, facility_type, capacity_m3, surface_area_m2,
                 current_volume_m3, is_lined, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', $8)
            RETURNING id, code, name, facility_type as "facility_type: _",
                      capacity_m3, surface_area_m2, current_volume_m3, is_lined,
                      status as "status: _", notes, created_at, updated_at
            "#,
            facility.code,
            facility.name,
            facility.facility_type as _,
            facility.capacity_m3,
            facility.surface_area_m2,
            facility.current_volume_m3,
            facility.is_lined,
            facility.notes,
        )
        .fetch_one(&self.pool)
        .await?;

        debug!(id = created.id, "created storage facility");
        Ok(created)
    }

    #[instrument(skip(self, facility), fields(id = facility.id))]
    pub async fn update(&self, facility: &StorageFacility) -> Result<StorageFacility, DbError> {
        if facility.current_volume_m3 > facility.capacity_m3 {
            return Err(DbError::InvariantViolation(
                "current_volume_m3 must not exceed capacity_m3".into(),
            ));
        }

        let updated = sqlx::query_as!(
            StorageFacility,
            r#"
            UPDATE storage_facilities
            SET name = $2, capacity_m3 = $3, surface_area_m2 = $4,
                current_volume_m3 = $5, is_lined = $6, status = $7,
                notes = $8, updated_at = now()
            WHERE id = $1
            RETURNING id, code, name, facility_type as "facility_type: _",
                      capacity_m3, surface_area_m2, current_volume_m3, is_lined,
                      status as "status: _", notes, created_at, updated_at
            "#,
            facility.id,
            facility.name,
            facility.capacity_m3,
            facility.surface_area_m2,
            facility.current_volume_m3,
            facility.is_lined,
            facility.status as _,
            facility.notes,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("facility {}", facility.id)))?;

        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let facility = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("facility {id}")))?;
        if facility.status == FacilityStatus::Active {
            return Err(DbError::InvariantViolation(
                "cannot delete an active facility".into(),
            ));
        }
        sqlx::query!("DELETE FROM storage_facilities WHERE id = $1", id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
