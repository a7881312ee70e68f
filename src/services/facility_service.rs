use std::sync::Arc;
use tracing::instrument;

use crate::cache::PersistentCache;
use crate::db::{DbError, FacilityRepository};
use crate::domain::{FacilityStatus, NewStorageFacility, StorageFacility};
use crate::error::WaterBalanceError;
use crate::workbook::TimeSeriesRepository;

/// Wraps [`FacilityRepository`] and invalidates the engine's persistent
/// result cache on any mutation, since a facility's capacity/surface area
/// feeds directly into every cached `StorageRecord`.
#[derive(Clone)]
pub struct FacilityService {
    repository: FacilityRepository,
    cache: Arc<PersistentCache>,
    time_series: Arc<TimeSeriesRepository>,
}

impl FacilityService {
    pub fn new(
        repository: FacilityRepository,
        cache: Arc<PersistentCache>,
        time_series: Arc<TimeSeriesRepository>,
    ) -> Self {
        Self {
            repository,
            cache,
            time_series,
        }
    }

    pub async fn get_all(&self) -> Result<Vec<StorageFacility>, WaterBalanceError> {
        Ok(self.repository.get_all().await?)
    }

    pub async fn list_by_status(
        &self,
        status: FacilityStatus,
    ) -> Result<Vec<StorageFacility>, WaterBalanceError> {
        Ok(self.repository.list_by_status(status).await?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<StorageFacility, WaterBalanceError> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or_else(|| WaterBalanceError::NotFound(format!("facility id {id}")))
    }

    pub async fn get_by_code(&self, code: &str) -> Result<StorageFacility, WaterBalanceError> {
        self.repository
            .get_by_code(code)
            .await?
            .ok_or_else(|| WaterBalanceError::NotFound(format!("facility code {code}")))
    }

    #[instrument(skip(self, facility), fields(code = %facility.code))]
    pub async fn create(
        &self,
        facility: NewStorageFacility,
    ) -> Result<StorageFacility, WaterBalanceError> {
        let validated = facility.validate()?;
        let created = self.repository.create(validated).await?;
        self.invalidate_cache(&created.code).await;
        Ok(created)
    }

    #[instrument(skip(self, facility), fields(id = facility.id))]
    pub async fn update(
        &self,
        facility: StorageFacility,
    ) -> Result<StorageFacility, WaterBalanceError> {
        let updated = self.repository.update(&facility).await?;
        self.invalidate_cache(&updated.code).await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), WaterBalanceError> {
        let facility = self.get_by_id(id).await?;
        match self.repository.delete(id).await {
            Ok(()) => {
                self.invalidate_cache(&facility.code).await;
                Ok(())
            }
            Err(DbError::InvariantViolation(msg)) => Err(WaterBalanceError::InvariantViolation(msg)),
            Err(e) => Err(e.into()),
        }
    }

    async fn invalidate_cache(&self, facility_code: &str) {
        let Some(signature) = self.time_series.current_signature().await else {
            return;
        };
        let prefix = format!("{signature}__{facility_code}__");
        if let Err(e) = self.cache.invalidate_prefix(&prefix) {
            tracing::warn!(facility_code, error = %e, "failed to invalidate cached storage records");
        }
    }
}
