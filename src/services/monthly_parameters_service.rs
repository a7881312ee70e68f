use crate::db::{MonthlyParameters, MonthlyParametersRepository};
use crate::error::WaterBalanceError;

#[derive(Clone)]
pub struct MonthlyParametersService {
    repository: MonthlyParametersRepository,
}

impl MonthlyParametersService {
    pub fn new(repository: MonthlyParametersRepository) -> Self {
        Self { repository }
    }

    pub async fn get_by_period(
        &self,
        facility_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Option<MonthlyParameters>, WaterBalanceError> {
        Ok(self.repository.get_by_period(facility_id, year, month).await?)
    }

    pub async fn upsert(
        &self,
        facility_id: i64,
        year: i32,
        month: i32,
        total_inflows_m3: f64,
        total_outflows_m3: f64,
    ) -> Result<MonthlyParameters, WaterBalanceError> {
        Ok(self
            .repository
            .upsert(facility_id, year, month, total_inflows_m3, total_outflows_m3)
            .await?)
    }
}
