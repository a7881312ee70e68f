pub mod alert_service;
pub mod constants_service;
pub mod facility_service;
pub mod monthly_parameters_service;

pub use alert_service::AlertService;
pub use constants_service::ConstantsService;
pub use facility_service::FacilityService;
pub use monthly_parameters_service::MonthlyParametersService;
