//! Per-facility monthly storage balance. Derives opening volume by
//! walking forward from the oldest period that needs recomputing, rather
//! than recursing month-by-month, bounded by `depth_limit`.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{instrument, warn};
use utoipa::ToSchema;

use crate::cache::PersistentCache;
use crate::domain::period::CalculationPeriod;
use crate::workbook::TimeSeriesRepository;

#[derive(Error, Debug)]
pub enum CalculatorError {
    #[error("input format error: {0}")]
    InputFormat(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub const DEFAULT_DEPTH_LIMIT: u32 = 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StorageRecord {
    pub opening_volume: f64,
    pub closing_volume: f64,
    pub level_percent: f64,
    pub inflow_manual: f64,
    pub outflow_manual: f64,
    pub inflow_total: f64,
    pub outflow_total: f64,
    pub rainfall_volume: f64,
    pub evaporation_volume: f64,
    pub abstraction_to_plant: f64,
    pub overflow: f64,
    pub deficit: f64,
    pub warnings: Vec<String>,
}

type MemoKey = (String, i32, u32);

pub struct StorageCalculator {
    repository: Arc<TimeSeriesRepository>,
    cache: Arc<PersistentCache>,
    memo: RwLock<HashMap<MemoKey, StorageRecord>>,
    depth_limit: u32,
}

impl StorageCalculator {
    pub fn new(repository: Arc<TimeSeriesRepository>, cache: Arc<PersistentCache>) -> Self {
        Self {
            repository,
            cache,
            memo: RwLock::new(HashMap::new()),
            depth_limit: DEFAULT_DEPTH_LIMIT,
        }
    }

    pub fn with_depth_limit(mut self, depth_limit: u32) -> Self {
        self.depth_limit = depth_limit;
        self
    }

    async fn cache_key(&self, facility: &str, period: &CalculationPeriod) -> Option<String> {
        let signature = self.repository.current_signature().await?;
        Some(format!(
            "{signature}__{facility}__{}-{:02}",
            period.year(),
            period.month()
        ))
    }

    async fn lookup(&self, facility: &str, period: &CalculationPeriod) -> Option<StorageRecord> {
        let key = (facility.to_string(), period.year(), period.month());
        if let Some(record) = self.memo.read().await.get(&key) {
            return Some(record.clone());
        }
        let cache_key = self.cache_key(facility, period).await?;
        let record: StorageRecord = self.cache.get(&cache_key)?;
        self.memo.write().await.insert(key, record.clone());
        Some(record)
    }

    async fn store(&self, facility: &str, period: &CalculationPeriod, record: &StorageRecord) {
        let key = (facility.to_string(), period.year(), period.month());
        self.memo.write().await.insert(key, record.clone());
        if let Some(cache_key) = self.cache_key(facility, period).await {
            if let Err(e) = self.cache.put(&cache_key, record) {
                warn!(facility, %period, error = %e, "failed to write storage record to persistent cache");
            }
        }
    }

    /// Returns `None` when the target period carries no row for `facility`.
    /// `manual_override`, when given, replaces the workbook-derived
    /// inflow/outflow totals for `period` itself (the authoritative monthly
    /// parameters case); historical periods in the opening-volume chain are
    /// unaffected.
    #[instrument(skip(self), fields(%facility, %period))]
    pub async fn get_storage_record(
        &self,
        facility: &str,
        period: CalculationPeriod,
        capacity: Option<f64>,
        surface_area: Option<f64>,
        manual_override: Option<(f64, f64)>,
    ) -> Result<Option<StorageRecord>, CalculatorError> {
        if manual_override.is_none() {
            if let Some(record) = self.lookup(facility, &period).await {
                return Ok(Some(record));
            }
        }

        let target_data = self.repository.get_period(period.year(), period.month()).await;
        let has_target_row = target_data
            .storage
            .iter()
            .any(|r| r.facility_code == facility);
        if !has_target_row {
            return Ok(None);
        }

        // Walk backward collecting periods that still need computing,
        // stopping at a cached period, a period with no row, or the depth limit.
        let mut chain = vec![period.clone()];
        let mut cursor = period.previous();
        let mut base_closing: Option<f64> = None;
        for _ in 0..self.depth_limit {
            if let Some(cached) = self.lookup(facility, &cursor).await {
                base_closing = Some(cached.closing_volume);
                break;
            }
            let cursor_data = self.repository.get_period(cursor.year(), cursor.month()).await;
            let has_row = cursor_data.storage.iter().any(|r| r.facility_code == facility);
            if !has_row {
                break;
            }
            chain.push(cursor.clone());
            cursor = cursor.previous();
        }
        chain.reverse();

        let mut opening = match base_closing {
            Some(closing) => closing,
            None => capacity.map(|c| 0.10 * c).unwrap_or(0.0),
        };
        let mut estimated_opening = base_closing.is_none();

        let mut result = None;
        for p in &chain {
            let period_data = if p == &period {
                target_data.clone()
            } else {
                self.repository.get_period(p.year(), p.month()).await
            };
            let row = period_data
                .storage
                .iter()
                .find(|r| r.facility_code == facility)
                .cloned()
                .unwrap_or_default();

            let override_for_period = if p == &period { manual_override } else { None };
            let mut record = derive_record(
                opening,
                capacity,
                surface_area,
                &row,
                &period_data.environmental,
                override_for_period,
            );
            if estimated_opening {
                record.warnings.push(format!(
                    "ESTIMATED: opening volume for {facility} in {p} used 10% of capacity baseline (no prior record)"
                ));
            }
            self.store(facility, p, &record).await;
            opening = record.closing_volume;
            estimated_opening = false;
            result = Some(record);
        }

        Ok(result)
    }
}

fn derive_record(
    opening: f64,
    capacity: Option<f64>,
    surface_area: Option<f64>,
    row: &crate::workbook::StorageRow,
    environmental: &Option<crate::workbook::EnvironmentalRow>,
    manual_override: Option<(f64, f64)>,
) -> StorageRecord {
    let (inflow_manual, outflow_manual) = manual_override
        .unwrap_or((row.inflow_m3.unwrap_or(0.0), row.outflow_m3.unwrap_or(0.0)));
    let abstraction_to_plant = row.abstraction_m3.unwrap_or(0.0);

    let (rainfall_volume, evaporation_volume) = match surface_area {
        Some(area) if area > 0.0 => {
            let rainfall_mm = environmental.as_ref().and_then(|e| e.rainfall_mm).unwrap_or(0.0);
            let evap_mm = environmental
                .as_ref()
                .and_then(|e| e.evaporation_mm)
                .unwrap_or(0.0);
            ((rainfall_mm / 1000.0) * area, (evap_mm / 1000.0) * area)
        }
        _ => (0.0, 0.0),
    };

    let inflow_total = inflow_manual + rainfall_volume;
    let outflow_total = outflow_manual + evaporation_volume + abstraction_to_plant;

    let mut closing = opening + inflow_total - outflow_total;
    let mut warnings = Vec::new();
    let mut overflow = 0.0;
    let mut deficit = 0.0;

    if let Some(cap) = capacity {
        if closing > cap {
            overflow = closing - cap;
            closing = cap;
            warnings.push(format!("OVERFLOW: Exceeds capacity by {overflow:.0} m³"));
        }
    }
    if closing < 0.0 {
        deficit = -closing;
        closing = 0.0;
        warnings.push(format!("DEFICIT: Insufficient water, deficit of {deficit:.0} m³"));
    }

    if let Some(cap) = capacity {
        if inflow_total > 1.5 * cap {
            warnings.push(format!(
                "WARNING: Total inflow ({inflow_total:.0} m³) exceeds 150% of capacity"
            ));
        }
    }
    if opening > 0.0 && outflow_total > 1.2 * opening {
        warnings.push(format!(
            "WARNING: Total outflow ({outflow_total:.0} m³) exceeds 120% of opening volume"
        ));
    }

    let level_percent = match capacity {
        Some(cap) if cap > 0.0 => opening / cap,
        _ => 0.0,
    };

    StorageRecord {
        opening_volume: opening,
        closing_volume: closing,
        level_percent,
        inflow_manual,
        outflow_manual,
        inflow_total,
        outflow_total,
        rainfall_volume,
        evaporation_volume,
        abstraction_to_plant,
        overflow,
        deficit,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::StorageRow;

    fn row(inflow: f64, outflow: f64) -> StorageRow {
        StorageRow {
            facility_code: "TSF1".into(),
            inflow_m3: Some(inflow),
            outflow_m3: Some(outflow),
            abstraction_m3: None,
        }
    }

    #[test]
    fn overflow_clamps_and_warns() {
        let record = derive_record(90.0, Some(100.0), None, &row(50.0, 0.0), &None, None);
        assert_eq!(record.closing_volume, 100.0);
        assert_eq!(record.overflow, 40.0);
        assert!(record.warnings.iter().any(|w| w.starts_with("OVERFLOW")));
    }

    #[test]
    fn deficit_clamps_and_warns() {
        let record = derive_record(10.0, Some(100.0), None, &row(0.0, 50.0), &None, None);
        assert_eq!(record.closing_volume, 0.0);
        assert_eq!(record.deficit, 40.0);
        assert!(record.warnings.iter().any(|w| w.starts_with("DEFICIT")));
    }

    #[test]
    fn environmental_flows_require_positive_surface_area() {
        let env = Some(crate::workbook::EnvironmentalRow {
            rainfall_mm: Some(100.0),
            evaporation_mm: Some(50.0),
            pan_coefficient: None,
        });
        let with_area = derive_record(0.0, Some(1000.0), Some(500.0), &row(0.0, 0.0), &env, None);
        assert_eq!(with_area.rainfall_volume, 50.0);
        assert_eq!(with_area.evaporation_volume, 25.0);

        let without_area = derive_record(0.0, Some(1000.0), None, &row(0.0, 0.0), &env, None);
        assert_eq!(without_area.rainfall_volume, 0.0);
    }

    #[test]
    fn sanity_warnings_fire_on_extreme_flows() {
        let high_inflow = derive_record(10.0, Some(100.0), None, &row(200.0, 0.0), &None, None);
        assert!(high_inflow
            .warnings
            .iter()
            .any(|w| w.contains("exceeds 150% of capacity")));

        let high_outflow = derive_record(10.0, Some(1000.0), None, &row(0.0, 20.0), &None, None);
        assert!(high_outflow
            .warnings
            .iter()
            .any(|w| w.contains("exceeds 120% of opening volume")));
    }

    #[test]
    fn level_percent_uses_opening_over_capacity() {
        let record = derive_record(25.0, Some(100.0), None, &row(0.0, 0.0), &None, None);
        assert_eq!(record.level_percent, 0.25);

        let no_capacity = derive_record(25.0, None, None, &row(0.0, 0.0), &None, None);
        assert_eq!(no_capacity.level_percent, 0.0);
    }
}
