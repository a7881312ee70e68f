//! Background recompute/sweep loops: a `tokio::time::interval` loop
//! delegating each tick to a private helper that returns a `Result`,
//! logged rather than propagated.
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::period::CalculationPeriod;
use crate::error::WaterBalanceError;
use crate::orchestrator::{BalanceOrchestrator, OrchestratorMode};

#[instrument(skip(orchestrator), fields(interval_minutes = %interval_minutes, ?mode))]
pub async fn start_balance_scheduler(
    orchestrator: Arc<BalanceOrchestrator>,
    mode: OrchestratorMode,
    interval_minutes: u64,
) {
    let mut interval = time::interval(Duration::from_secs(interval_minutes * 60));

    info!(
        "Balance scheduler started with {} minute interval",
        interval_minutes
    );

    loop {
        interval.tick().await;
        debug!("Balance scheduler tick - recomputing current period");

        match recompute_current_period(&orchestrator, mode).await {
            Ok(summary) => info!(summary, "recompute complete"),
            Err(e) => error!("Failed to recompute balance: {}", e),
        }
    }
}

async fn recompute_current_period(
    orchestrator: &BalanceOrchestrator,
    mode: OrchestratorMode,
) -> Result<String, WaterBalanceError> {
    let today = Utc::now().date_naive();
    let period = CalculationPeriod::from_date(today)?;
    let (result, alerts) = orchestrator.run(period, mode).await?;
    if !alerts.is_empty() {
        info!(triggered = alerts.len(), "alerts raised during scheduled recompute");
    }
    Ok(result.summary())
}

#[instrument(skip(orchestrator), fields(interval_minutes = %interval_minutes))]
pub async fn start_alert_sweep_scheduler(
    orchestrator: Arc<BalanceOrchestrator>,
    _mode: OrchestratorMode,
    interval_minutes: u64,
) {
    let mut interval = time::interval(Duration::from_secs(interval_minutes * 60));

    info!(
        "Alert sweep scheduler started with {} minute interval",
        interval_minutes
    );

    loop {
        interval.tick().await;
        debug!("Alert sweep scheduler tick");

        match sweep_alerts(&orchestrator).await {
            Ok(resolved) => {
                if resolved > 0 {
                    info!(resolved, "auto-resolved alerts during sweep");
                } else {
                    debug!("No alerts auto-resolved this sweep");
                }
            }
            Err(e) => error!("Failed to sweep alerts: {}", e),
        }
    }
}

async fn sweep_alerts(orchestrator: &BalanceOrchestrator) -> Result<u32, WaterBalanceError> {
    let today = Utc::now().date_naive();
    let period = CalculationPeriod::from_date(today)?;
    match orchestrator.sweep_alerts(period).await {
        Ok(resolved) => Ok(resolved),
        Err(e) => {
            warn!("alert sweep could not recompute current period: {}", e);
            Err(e)
        }
    }
}
