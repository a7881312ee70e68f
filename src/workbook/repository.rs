//! In-memory, signature-invalidated view over the six required workbook
//! sheets. Mirrors the reference implementation's "load once, reuse until
//! the file changes" caching, with the six sheets read in parallel via
//! `spawn_blocking` rather than sequentially.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{instrument, warn};

use super::loader::{
    self, ConsumptionRow, DischargeRecord, EnvironmentalRow, ProductionRow, SeepageRow, SheetError,
    StorageRow,
};
use super::signature::excel_signature;
use crate::error::WaterBalanceError;

type PeriodKey = (i32, u32);

#[derive(Debug, Default)]
struct WorkbookData {
    environmental: HashMap<PeriodKey, EnvironmentalRow>,
    storage: HashMap<PeriodKey, Vec<StorageRow>>,
    production: HashMap<PeriodKey, ProductionRow>,
    consumption: HashMap<PeriodKey, ConsumptionRow>,
    seepage: HashMap<PeriodKey, SeepageRow>,
    discharge: HashMap<PeriodKey, Vec<DischargeRecord>>,
}

/// All rows relevant to a single calculation period, pulled from the six
/// sheets. Fields are `None`/empty when the workbook carries no row for
/// that period; the caller (the calculator) is responsible for turning
/// that into a `DataQualityFlags::add_missing` entry.
#[derive(Debug, Clone, Default)]
pub struct PeriodData {
    pub environmental: Option<EnvironmentalRow>,
    pub storage: Vec<StorageRow>,
    pub production: Option<ProductionRow>,
    pub consumption: Option<ConsumptionRow>,
    pub seepage: Option<SeepageRow>,
    pub discharge: Vec<DischargeRecord>,
}

pub struct TimeSeriesRepository {
    workbook_path: PathBuf,
    cache_dir: PathBuf,
    signature: RwLock<Option<String>>,
    data: RwLock<Arc<WorkbookData>>,
}

impl TimeSeriesRepository {
    pub fn new(workbook_path: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            workbook_path: workbook_path.into(),
            cache_dir: cache_dir.into(),
            signature: RwLock::new(None),
            data: RwLock::new(Arc::new(WorkbookData::default())),
        }
    }

    /// Loads the workbook if its signature differs from the one currently
    /// cached. A no-op when nothing on disk has changed.
    #[instrument(skip(self), fields(path = %self.workbook_path.display()))]
    pub async fn load(&self) -> Result<(), WaterBalanceError> {
        let current_sig = excel_signature(&self.workbook_path)?;
        if self.signature.read().await.as_deref() == Some(current_sig.as_str()) {
            return Ok(());
        }
        self.force_load(current_sig).await
    }

    /// Reloads unconditionally and purges any persistent cache entries
    /// keyed on the workbook's previous signature.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<(), WaterBalanceError> {
        if let Some(old_sig) = self.signature.read().await.clone() {
            crate::cache::purge_for_workbook(&self.cache_dir, &old_sig)?;
        }
        let current_sig = excel_signature(&self.workbook_path)?;
        self.force_load(current_sig).await
    }

    async fn force_load(&self, signature: String) -> Result<(), WaterBalanceError> {
        let path = self.workbook_path.clone();
        let (environmental, storage, production, consumption, seepage, discharge) = tokio::try_join!(
            spawn_load(path.clone(), loader::load_environmental_sheet),
            spawn_load(path.clone(), loader::load_storage_sheet),
            spawn_load(path.clone(), loader::load_production_sheet),
            spawn_load(path.clone(), loader::load_consumption_sheet),
            spawn_load(path.clone(), loader::load_seepage_sheet),
            spawn_load(path.clone(), loader::load_discharge_sheet),
        )?;

        let data = WorkbookData {
            environmental: isolate("Environmental", environmental),
            storage: isolate("Storage_Facilities", storage),
            production: isolate("Production", production),
            consumption: isolate("Consumption", consumption),
            seepage: isolate("Seepage_Losses", seepage),
            discharge: isolate("Discharge", discharge),
        };

        *self.data.write().await = Arc::new(data);
        *self.signature.write().await = Some(signature);
        Ok(())
    }

    pub async fn get_period(&self, year: i32, month: u32) -> PeriodData {
        let data = self.data.read().await.clone();
        let key = (year, month);
        PeriodData {
            environmental: data.environmental.get(&key).cloned(),
            storage: data.storage.get(&key).cloned().unwrap_or_default(),
            production: data.production.get(&key).cloned(),
            consumption: data.consumption.get(&key).cloned(),
            seepage: data.seepage.get(&key).cloned(),
            discharge: data.discharge.get(&key).cloned().unwrap_or_default(),
        }
    }

    pub async fn current_signature(&self) -> Option<String> {
        self.signature.read().await.clone()
    }

    pub fn workbook_path(&self) -> &Path {
        &self.workbook_path
    }
}

/// Turns a per-sheet load failure into an empty frame, logging a warning
/// rather than aborting the whole workbook load. A missing `Discharge`
/// sheet, for instance, shouldn't prevent `Storage_Facilities` from
/// loading.
fn isolate<T: Default>(sheet: &str, result: Result<T, SheetError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(sheet, error = %e, "sheet load failed, using an empty frame");
            T::default()
        }
    }
}

async fn spawn_load<T, F>(
    path: PathBuf,
    f: F,
) -> Result<Result<T, super::loader::SheetError>, WaterBalanceError>
where
    T: Send + 'static,
    F: FnOnce(&Path) -> Result<T, super::loader::SheetError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&path))
        .await
        .map_err(|e| WaterBalanceError::StorageBackendError(format!("sheet load task panicked: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_period_on_empty_repository_returns_defaults() {
        let repo = TimeSeriesRepository::new("/tmp/does-not-matter.xlsx", "/tmp/wbe-cache-test");
        let period = repo.get_period(2026, 3).await;
        assert!(period.environmental.is_none());
        assert!(period.storage.is_empty());
    }
}
