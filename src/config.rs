//! Env-driven configuration: plain `env::var` reads with typed string
//! defaults, no config crate.
use std::env;

use crate::orchestrator::OrchestratorMode;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub workbook_path: String,
    pub balance_mode: OrchestratorMode,
    pub logging_level: String,
    pub logging_retention_days: u32,
    pub cache_dir: String,
    pub balance_recompute_interval_minutes: u64,
    pub alert_sweep_interval_minutes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            workbook_path: env::var("WORKBOOK_PATH")
                .unwrap_or_else(|_| "data/water_balance.xlsx".to_string()),
            balance_mode: env::var("BALANCE_MODE")
                .ok()
                .and_then(|s| parse_mode(&s))
                .unwrap_or(OrchestratorMode::Regulator),
            logging_level: env::var("LOGGING_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            logging_retention_days: env::var("LOGGING_RETENTION_DAYS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .unwrap_or(90),
            cache_dir: env::var("CACHE_DIR").unwrap_or_else(|_| "data/cache".to_string()),
            balance_recompute_interval_minutes: env::var("BALANCE_RECOMPUTE_INTERVAL_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            alert_sweep_interval_minutes: env::var("ALERT_SWEEP_INTERVAL_MINUTES")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .unwrap_or(15),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_mode(s: &str) -> Option<OrchestratorMode> {
    match s.to_uppercase().as_str() {
        "REGULATOR" => Some(OrchestratorMode::Regulator),
        "INTERNAL" => Some(OrchestratorMode::Internal),
        "AUDIT" => Some(OrchestratorMode::Audit),
        _ => None,
    }
}
