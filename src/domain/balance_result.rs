use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::period::CalculationPeriod;
use super::quality::DataQualityFlags;

/// One named line item inside an [`InflowResult`] or [`OutflowResult`],
/// kept alongside the closed-set named fields for audit/report rendering
/// (`AUDIT` mode attaches the full list; other modes may omit it).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComponentDetail {
    pub name: String,
    pub value_m3: f64,
    pub source: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct InflowResult {
    pub rainfall_m3: f64,
    pub abstraction_m3: f64,
    pub ore_moisture_m3: f64,
    pub other_m3: f64,
    pub component_details: Vec<ComponentDetail>,
}

impl InflowResult {
    pub fn total(&self) -> f64 {
        self.rainfall_m3 + self.abstraction_m3 + self.ore_moisture_m3 + self.other_m3
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct OutflowResult {
    pub evaporation_m3: f64,
    pub seepage_m3: f64,
    pub dust_suppression_m3: f64,
    pub mining_m3: f64,
    pub domestic_m3: f64,
    pub irrigation_m3: f64,
    pub tailings_lockup_m3: f64,
    pub discharge_m3: f64,
    pub other_m3: f64,
    pub component_details: Vec<ComponentDetail>,
}

impl OutflowResult {
    pub fn total(&self) -> f64 {
        self.evaporation_m3
            + self.seepage_m3
            + self.dust_suppression_m3
            + self.mining_m3
            + self.domestic_m3
            + self.irrigation_m3
            + self.tailings_lockup_m3
            + self.discharge_m3
            + self.other_m3
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FacilityStorageDelta {
    pub facility_code: String,
    pub opening_m3: f64,
    pub closing_m3: f64,
    pub delta_m3: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StorageChange {
    pub delta_m3: f64,
    pub closing_pct: f64,
    pub is_overflow: bool,
    pub facility_breakdown: Vec<FacilityStorageDelta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RecycledWater {
    pub tsf_return_m3: f64,
    pub rwd_recirc_m3: f64,
    pub process_recirc_m3: f64,
}

impl RecycledWater {
    pub fn total(&self) -> f64 {
        self.tsf_return_m3 + self.rwd_recirc_m3 + self.process_recirc_m3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EfficiencyRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct KpiResult {
    pub recycled_pct: f64,
    pub water_intensity_m3_per_tonne: Option<f64>,
    pub abstraction_pct_of_license: Option<f64>,
    pub rwd_intensity_measured: Option<f64>,
    pub rwd_intensity_calculated: Option<f64>,
    pub tailings_moisture_from_density: Option<f64>,
}

impl KpiResult {
    /// `Excellent` >= 80, `Good` >= 60, `Fair` >= 40, else `Poor`.
    pub fn efficiency_rating(&self) -> EfficiencyRating {
        if self.recycled_pct >= 80.0 {
            EfficiencyRating::Excellent
        } else if self.recycled_pct >= 60.0 {
            EfficiencyRating::Good
        } else if self.recycled_pct >= 40.0 {
            EfficiencyRating::Fair
        } else {
            EfficiencyRating::Poor
        }
    }

    /// `true` when measured and calculated RWD intensity diverge by more
    /// than the configured tolerance (default 5%).
    pub fn rwd_cross_check_flagged(&self, tolerance_pct: f64) -> bool {
        match (self.rwd_intensity_measured, self.rwd_intensity_calculated) {
            (Some(measured), Some(calculated)) if measured != 0.0 => {
                let diff_pct = (measured - calculated).abs() / measured * 100.0;
                diff_pct > tolerance_pct
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum FacilityBalanceStatus {
    Critical,
    High,
    Normal,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FacilityBalance {
    pub facility_code: String,
    pub opening_m3: f64,
    pub closing_m3: f64,
    pub capacity_m3: f64,
    pub overflow_m3: f64,
    pub deficit_m3: f64,
    pub abstraction_to_plant_m3: f64,
    pub warnings: Vec<String>,
}

impl FacilityBalance {
    pub fn level_pct(&self) -> f64 {
        if self.capacity_m3 <= 0.0 {
            0.0
        } else {
            self.closing_m3 / self.capacity_m3 * 100.0
        }
    }

    /// `CRITICAL` >= 95%, `HIGH` >= 80%, `NORMAL` >= 20%, else `LOW`.
    pub fn status(&self) -> FacilityBalanceStatus {
        let pct = self.level_pct();
        if pct >= 95.0 {
            FacilityBalanceStatus::Critical
        } else if pct >= 80.0 {
            FacilityBalanceStatus::High
        } else if pct >= 20.0 {
            FacilityBalanceStatus::Normal
        } else {
            FacilityBalanceStatus::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum BalanceStatus {
    Green,
    Red,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceResult {
    pub period: CalculationPeriod,
    pub inflows: InflowResult,
    pub outflows: OutflowResult,
    pub storage: StorageChange,
    pub recycled: Option<RecycledWater>,
    pub kpis: Option<KpiResult>,
    pub facilities: Vec<FacilityBalance>,
    pub quality_flags: DataQualityFlags,
    pub balance_error_threshold_pct: f64,
}

impl BalanceResult {
    pub fn balance_error_m3(&self) -> f64 {
        self.inflows.total() - self.outflows.total() - self.storage.delta_m3
    }

    /// `0` when `inflows.total() == 0`, never `NaN`.
    pub fn error_pct(&self) -> f64 {
        let total_in = self.inflows.total();
        if total_in == 0.0 {
            0.0
        } else {
            (self.balance_error_m3().abs() / total_in) * 100.0
        }
    }

    pub fn status(&self) -> BalanceStatus {
        if self.error_pct().abs() < self.balance_error_threshold_pct {
            BalanceStatus::Green
        } else {
            BalanceStatus::Red
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.status() == BalanceStatus::Green
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {:?} (error {:.2}%, {} facilities, {} quality issues)",
            self.period,
            self.status(),
            self.error_pct(),
            self.facilities.len(),
            self.quality_flags.issue_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period() -> CalculationPeriod {
        CalculationPeriod::new(2026, 3).unwrap()
    }

    #[test]
    fn zero_inflow_gives_zero_error_pct_not_nan() {
        let result = BalanceResult {
            period: period(),
            inflows: InflowResult::default(),
            outflows: OutflowResult::default(),
            storage: StorageChange::default(),
            recycled: None,
            kpis: None,
            facilities: vec![],
            quality_flags: DataQualityFlags::new(),
            balance_error_threshold_pct: 5.0,
        };
        assert_eq!(result.error_pct(), 0.0);
        assert!(!result.error_pct().is_nan());
    }

    #[test]
    fn s4_scenario_is_green() {
        let mut inflows = InflowResult::default();
        inflows.rainfall_m3 = 1_000_000.0;
        let mut outflows = OutflowResult::default();
        outflows.other_m3 = 940_000.0;
        let storage = StorageChange {
            delta_m3: 40_000.0,
            closing_pct: 0.0,
            is_overflow: false,
            facility_breakdown: vec![],
        };
        let result = BalanceResult {
            period: period(),
            inflows,
            outflows,
            storage,
            recycled: None,
            kpis: None,
            facilities: vec![],
            quality_flags: DataQualityFlags::new(),
            balance_error_threshold_pct: 5.0,
        };
        assert_eq!(result.balance_error_m3(), 20_000.0);
        assert!((result.error_pct() - 2.0).abs() < 1e-9);
        assert_eq!(result.status(), BalanceStatus::Green);
    }

    #[test]
    fn facility_balance_status_thresholds() {
        let make = |closing: f64| FacilityBalance {
            facility_code: "TSF1".into(),
            opening_m3: 0.0,
            closing_m3: closing,
            capacity_m3: 100.0,
            overflow_m3: 0.0,
            deficit_m3: 0.0,
            abstraction_to_plant_m3: 0.0,
            warnings: vec![],
        };
        assert_eq!(make(96.0).status(), FacilityBalanceStatus::Critical);
        assert_eq!(make(85.0).status(), FacilityBalanceStatus::High);
        assert_eq!(make(50.0).status(), FacilityBalanceStatus::Normal);
        assert_eq!(make(10.0).status(), FacilityBalanceStatus::Low);
    }

    #[test]
    fn efficiency_rating_thresholds() {
        let make = |pct: f64| KpiResult {
            recycled_pct: pct,
            ..Default::default()
        };
        assert_eq!(make(85.0).efficiency_rating(), EfficiencyRating::Excellent);
        assert_eq!(make(65.0).efficiency_rating(), EfficiencyRating::Good);
        assert_eq!(make(45.0).efficiency_rating(), EfficiencyRating::Fair);
        assert_eq!(make(10.0).efficiency_rating(), EfficiencyRating::Poor);
    }

    #[test]
    fn rwd_cross_check_flags_large_divergence() {
        let kpis = KpiResult {
            rwd_intensity_measured: Some(1.0),
            rwd_intensity_calculated: Some(1.2),
            ..Default::default()
        };
        assert!(kpis.rwd_cross_check_flagged(5.0));
        let kpis_close = KpiResult {
            rwd_intensity_measured: Some(1.0),
            rwd_intensity_calculated: Some(1.01),
            ..Default::default()
        };
        assert!(!kpis_close.rwd_cross_check_flagged(5.0));
    }
}
