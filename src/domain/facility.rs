use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::WaterBalanceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, ToSchema)]
#[sqlx(type_name = "text")]
#[serde(rename_all = "PascalCase")]
pub enum FacilityType {
    #[sqlx(rename = "TSF")]
    #[serde(rename = "TSF")]
    Tsf,
    #[sqlx(rename = "Pond")]
    Pond,
    #[sqlx(rename = "Dam")]
    Dam,
    #[sqlx(rename = "Tank")]
    Tank,
    #[sqlx(rename = "Other")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, ToSchema)]
#[sqlx(type_name = "text")]
#[serde(rename_all = "lowercase")]
pub enum FacilityStatus {
    Active,
    Inactive,
    Decommissioned,
}

/// A storage facility record, durably owned by the facility service.
///
/// Construction and mutation both run through [`StorageFacility::new`] /
/// the service layer so the `is_lined` invariant can never be bypassed.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct StorageFacility {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub facility_type: FacilityType,
    pub capacity_m3: f64,
    pub surface_area_m2: Option<f64>,
    pub current_volume_m3: f64,
    pub is_lined: Option<bool>,
    pub status: FacilityStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a facility; `id`/timestamps are assigned
/// by the repository.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewStorageFacility {
    pub code: String,
    pub name: String,
    pub facility_type: FacilityType,
    pub capacity_m3: f64,
    pub surface_area_m2: Option<f64>,
    pub current_volume_m3: f64,
    pub is_lined: Option<bool>,
    pub notes: Option<String>,
}

impl NewStorageFacility {
    /// Validates and normalizes the `is_lined` invariant: `Tank` facilities
    /// are forced to `None` (not-applicable), all others must specify a
    /// value.
    pub fn validate(mut self) -> Result<Self, WaterBalanceError> {
        if self.capacity_m3 <= 0.0 {
            return Err(WaterBalanceError::InvariantViolation(
                "capacity_m3 must be > 0".into(),
            ));
        }
        if let Some(area) = self.surface_area_m2 {
            if area < 0.0 {
                return Err(WaterBalanceError::InvariantViolation(
                    "surface_area_m2 must be >= 0".into(),
                ));
            }
        }
        if !(0.0..=self.capacity_m3).contains(&self.current_volume_m3) {
            return Err(WaterBalanceError::InvariantViolation(
                "current_volume_m3 must be in [0, capacity_m3]".into(),
            ));
        }
        match self.facility_type {
            FacilityType::Tank => self.is_lined = None,
            _ if self.is_lined.is_none() => {
                return Err(WaterBalanceError::InvariantViolation(
                    "is_lined is required for non-Tank facility types".into(),
                ));
            }
            _ => {}
        }
        Ok(self)
    }
}

impl StorageFacility {
    pub fn level_percent(&self) -> f64 {
        if self.capacity_m3 <= 0.0 {
            0.0
        } else {
            self.current_volume_m3 / self.capacity_m3
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> NewStorageFacility {
        NewStorageFacility {
            code: "TSF1".into(),
            name: "Tailings Storage 1".into(),
            facility_type: FacilityType::Tsf,
            capacity_m3: 500_000.0,
            surface_area_m2: Some(10_000.0),
            current_volume_m3: 100_000.0,
            is_lined: Some(true),
            notes: None,
        }
    }

    #[test]
    fn tank_forces_is_lined_null() {
        let mut f = base();
        f.facility_type = FacilityType::Tank;
        f.is_lined = Some(true);
        let validated = f.validate().unwrap();
        assert_eq!(validated.is_lined, None);
    }

    #[test]
    fn non_tank_requires_is_lined() {
        let mut f = base();
        f.is_lined = None;
        assert!(f.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_capacity() {
        let mut f = base();
        f.capacity_m3 = 0.0;
        assert!(f.validate().is_err());
    }

    #[test]
    fn rejects_volume_above_capacity() {
        let mut f = base();
        f.current_volume_m3 = f.capacity_m3 + 1.0;
        assert!(f.validate().is_err());
    }
}
