//! Core domain types for the water balance engine.
pub mod balance_result;
pub mod facility;
pub mod period;
pub mod quality;

pub use balance_result::{
    BalanceResult, BalanceStatus, ComponentDetail, FacilityBalance, FacilityBalanceStatus,
    FacilityStorageDelta, InflowResult, KpiResult, OutflowResult, RecycledWater, StorageChange,
};
pub use facility::{FacilityStatus, FacilityType, NewStorageFacility, StorageFacility};
pub use period::CalculationPeriod;
pub use quality::DataQualityFlags;
