pub mod alert_repository;
pub mod alert_rule_repository;
pub mod constants_repository;
pub mod environmental_repository;
pub mod error;
pub mod facility_repository;
pub mod facility_transfer_repository;
pub mod models;
pub mod monthly_parameters_repository;
pub mod pool;
pub mod storage_history_repository;

pub use alert_repository::AlertRepository;
pub use alert_rule_repository::AlertRuleRepository;
pub use constants_repository::ConstantsRepository;
pub use environmental_repository::EnvironmentalRepository;
pub use error::DbError;
pub use facility_repository::FacilityRepository;
pub use facility_transfer_repository::FacilityTransferRepository;
pub use models::*;
pub use monthly_parameters_repository::MonthlyParametersRepository;
pub use pool::DbPool;
pub use storage_history_repository::StorageHistoryRepository;
