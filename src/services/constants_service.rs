use crate::db::{ConstantsRepository, SystemConstant};
use crate::error::WaterBalanceError;

#[derive(Clone)]
pub struct ConstantsService {
    repository: ConstantsRepository,
}

impl ConstantsService {
    pub fn new(repository: ConstantsRepository) -> Self {
        Self { repository }
    }

    pub async fn ensure_seeded(&self) -> Result<(), WaterBalanceError> {
        Ok(self.repository.seed_defaults().await?)
    }

    pub async fn get_all(&self) -> Result<Vec<SystemConstant>, WaterBalanceError> {
        Ok(self.repository.get_all().await?)
    }

    pub async fn get_value(&self, key: &str, default: f64) -> f64 {
        self.repository.get_value_or(key, default).await
    }

    /// `None` when the constant isn't configured, as opposed to
    /// [`get_value`](Self::get_value)'s always-present default.
    pub async fn get_value_opt(&self, key: &str) -> Option<f64> {
        self.repository.get(key).await.ok().flatten().map(|c| c.constant_value)
    }

    pub async fn set(
        &self,
        key: &str,
        new_value: f64,
        updated_by: Option<&str>,
    ) -> Result<SystemConstant, WaterBalanceError> {
        Ok(self.repository.set(key, new_value, updated_by).await?)
    }
}
