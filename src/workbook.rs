//! Time-series ingest and cache layer.
pub mod loader;
pub mod repository;
pub mod signature;

pub use loader::{
    ConsumptionRow, DischargeRecord, EnvironmentalRow, ProductionRow, SeepageRow, SheetError,
    StorageRow, WorkbookError,
};
pub use repository::TimeSeriesRepository;
pub use signature::excel_signature;
