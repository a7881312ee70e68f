//! Period-level balance computation: enumerates inflows/outflows
//! across all active facilities, closes the mass-balance identity, and
//! derives KPIs. Never panics on missing input — gaps become
//! `DataQualityFlags` entries instead.
use std::sync::Arc;
use tracing::instrument;

use crate::calculator::StorageCalculator;
use crate::domain::period::CalculationPeriod;
use crate::domain::{
    BalanceResult, ComponentDetail, DataQualityFlags, FacilityBalance, FacilityStatus,
    FacilityStorageDelta, InflowResult, KpiResult, OutflowResult, RecycledWater, StorageChange,
};
use crate::error::WaterBalanceError;
use crate::services::{ConstantsService, FacilityService, MonthlyParametersService};
use crate::workbook::TimeSeriesRepository;

pub struct BalanceEngine {
    calculator: Arc<StorageCalculator>,
    repository: Arc<TimeSeriesRepository>,
    facilities: FacilityService,
    constants: ConstantsService,
    monthly_params: MonthlyParametersService,
}

impl BalanceEngine {
    pub fn new(
        calculator: Arc<StorageCalculator>,
        repository: Arc<TimeSeriesRepository>,
        facilities: FacilityService,
        constants: ConstantsService,
        monthly_params: MonthlyParametersService,
    ) -> Self {
        Self {
            calculator,
            repository,
            facilities,
            constants,
            monthly_params,
        }
    }

    #[instrument(skip(self), fields(%period))]
    pub async fn compute(&self, period: CalculationPeriod) -> Result<BalanceResult, WaterBalanceError> {
        let active_facilities = self.facilities.list_by_status(FacilityStatus::Active).await?;
        let mut quality = DataQualityFlags::new();

        let mut inflows = InflowResult::default();
        let mut outflows = OutflowResult::default();
        let mut storage = StorageChange::default();
        let mut facility_balances = Vec::with_capacity(active_facilities.len());

        let mut lined_opening_sum = 0.0;
        let mut unlined_opening_sum = 0.0;

        for facility in &active_facilities {
            let manual_override = self
                .monthly_params
                .get_by_period(facility.id, period.year(), period.month())
                .await?
                .map(|params| (params.total_inflows_m3, params.total_outflows_m3));

            let record = self
                .calculator
                .get_storage_record(
                    &facility.code,
                    period,
                    Some(facility.capacity_m3),
                    facility.surface_area_m2,
                    manual_override,
                )
                .await?;

            let Some(record) = record else {
                quality.add_missing(format!("storage.{}", facility.code));
                continue;
            };

            inflows.rainfall_m3 += record.rainfall_volume;
            outflows.evaporation_m3 += record.evaporation_volume;

            let delta = record.closing_volume - record.opening_volume;
            storage.delta_m3 += delta;
            storage.facility_breakdown.push(FacilityStorageDelta {
                facility_code: facility.code.clone(),
                opening_m3: record.opening_volume,
                closing_m3: record.closing_volume,
                delta_m3: delta,
            });
            if record.closing_volume >= facility.capacity_m3 {
                storage.is_overflow = true;
            }

            match facility.is_lined {
                Some(true) => lined_opening_sum += record.opening_volume,
                Some(false) => unlined_opening_sum += record.opening_volume,
                None => {}
            }

            facility_balances.push(FacilityBalance {
                facility_code: facility.code.clone(),
                opening_m3: record.opening_volume,
                closing_m3: record.closing_volume,
                capacity_m3: facility.capacity_m3,
                overflow_m3: record.overflow,
                deficit_m3: record.deficit,
                abstraction_to_plant_m3: record.abstraction_to_plant,
                warnings: record.warnings,
            });
        }

        if !storage.facility_breakdown.is_empty() {
            let total_capacity: f64 = active_facilities.iter().map(|f| f.capacity_m3).sum();
            let total_closing: f64 = storage
                .facility_breakdown
                .iter()
                .map(|b| b.closing_m3)
                .sum();
            storage.closing_pct = if total_capacity > 0.0 {
                total_closing / total_capacity * 100.0
            } else {
                0.0
            };
        }

        let period_data = self.repository.get_period(period.year(), period.month()).await;

        if let Some(production) = &period_data.production {
            if let (Some(tonnes), Some(moisture_pct)) =
                (production.concentrate_tonnes, production.concentrate_moisture_pct)
            {
                let ore_moisture = tonnes * (moisture_pct / 100.0);
                inflows.ore_moisture_m3 = ore_moisture;
                inflows.component_details.push(ComponentDetail {
                    name: "ore_moisture".into(),
                    value_m3: ore_moisture,
                    source: "Production".into(),
                });
            } else {
                quality.add_missing("inflows.ore_moisture".into());
            }

            let solids_density = self.constants.get_value("tailings_solids_density", 2.7).await;
            if let (Some(tailings_tonnes), Some(moisture_pct)) =
                (production.tailings_tonnes, production.tailings_moisture_pct)
            {
                if solids_density > 0.0 {
                    outflows.tailings_lockup_m3 = tailings_tonnes * (moisture_pct / 100.0) / solids_density;
                }
            } else {
                quality.add_missing("outflows.tailings_lockup".into());
            }
        } else {
            quality.add_missing("production".into());
        }

        if let Some(consumption) = &period_data.consumption {
            outflows.dust_suppression_m3 = consumption.dust_suppression_m3.unwrap_or(0.0);
            outflows.mining_m3 = consumption.mining_m3.unwrap_or(0.0);
            outflows.domestic_m3 = consumption.domestic_m3.unwrap_or(0.0);
            outflows.irrigation_m3 = consumption.irrigation_m3.unwrap_or(0.0);
            outflows.other_m3 = consumption.other_m3.unwrap_or(0.0);
        } else {
            quality.add_missing("consumption".into());
        }

        outflows.seepage_m3 = match &period_data.seepage {
            Some(seepage) if seepage.seepage_loss_m3.is_some() => {
                let loss = seepage.seepage_loss_m3.unwrap_or(0.0);
                let gain = seepage.seepage_gain_m3.unwrap_or(0.0);
                (loss - gain).max(0.0)
            }
            _ => {
                quality.add_estimated("outflows.seepage".into());
                let lined_rate = self.constants.get_value("seepage_rate_lined_pct", 0.5).await / 100.0;
                let unlined_rate = self.constants.get_value("seepage_rate_unlined_pct", 2.0).await / 100.0;
                lined_opening_sum * lined_rate + unlined_opening_sum * unlined_rate
            }
        };

        outflows.discharge_m3 = period_data.discharge.iter().filter_map(|d| d.discharge_volume_m3).sum();
        for d in &period_data.discharge {
            if let Some(volume) = d.discharge_volume_m3 {
                outflows.component_details.push(ComponentDetail {
                    name: format!("discharge.{}", d.facility_code),
                    value_m3: volume,
                    source: "Discharge".into(),
                });
            }
        }

        // No sheet in the workbook models external abstraction or recirculation
        // flows, so both stay at their zero defaults until a source is configured.
        quality.add_missing("inflows.abstraction".into());
        quality.add_missing("recycled_water".into());

        let recycled = RecycledWater::default();
        let fresh_in_total = inflows.total();
        let recycled_pct = if fresh_in_total + recycled.total() > 0.0 {
            recycled.total() / (fresh_in_total + recycled.total()) * 100.0
        } else {
            0.0
        };

        let water_intensity_m3_per_tonne = period_data
            .production
            .as_ref()
            .and_then(|p| p.concentrate_tonnes)
            .filter(|t| *t > 0.0)
            .map(|tonnes| fresh_in_total / tonnes);

        let license_limit = self.constants.get_value_opt("abstraction_license_limit_m3").await;
        let abstraction_pct_of_license = license_limit
            .filter(|limit| *limit > 0.0)
            .map(|limit| inflows.abstraction_m3 / limit * 100.0);

        let solids_density = self.constants.get_value("tailings_solids_density", 2.7).await;
        let tailings_moisture_from_density = period_data.production.as_ref().and_then(|p| {
            let slurry_density = p.slurry_density?;
            if slurry_density <= 0.0 || solids_density <= 0.0 {
                return None;
            }
            // mass fraction of water implied by slurry vs solids density.
            Some((1.0 / slurry_density - 1.0 / solids_density) / (1.0 - 1.0 / solids_density) * 100.0)
        });

        let kpis = KpiResult {
            recycled_pct,
            water_intensity_m3_per_tonne,
            abstraction_pct_of_license,
            rwd_intensity_measured: None,
            rwd_intensity_calculated: None,
            tailings_moisture_from_density,
        };

        let balance_error_threshold_pct = self.constants.get_value("balance_error_threshold_pct", 5.0).await;

        Ok(BalanceResult {
            period,
            inflows,
            outflows,
            storage,
            recycled: Some(recycled),
            kpis: Some(kpis),
            facilities: facility_balances,
            quality_flags: quality,
            balance_error_threshold_pct,
        })
    }
}
