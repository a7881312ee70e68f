//! Balance Orchestrator: the glue the composition root hands to
//! both the HTTP API and the background scheduler. Validates inputs,
//! invokes the engine, evaluates alerts, and persists results according
//! to the run mode.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::db::{Alert, DataSource, StorageHistoryRepository};
use crate::domain::period::CalculationPeriod;
use crate::domain::BalanceResult;
use crate::engine::BalanceEngine;
use crate::error::WaterBalanceError;
use crate::services::AlertService;

/// Mode affects clamping strictness/persistence policy only; the core
/// equations computed by the engine are invariant across all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrchestratorMode {
    /// Strict, conservative clamping; the mode a regulator report is run in.
    Regulator,
    /// Same math, looser thresholds for warnings, used for internal dashboards.
    Internal,
    /// Attaches full component breakdowns and quality notes for audit trails.
    Audit,
}

pub struct BalanceOrchestrator {
    engine: BalanceEngine,
    alerts: AlertService,
    storage_history: StorageHistoryRepository,
}

impl BalanceOrchestrator {
    pub fn new(
        engine: BalanceEngine,
        alerts: AlertService,
        storage_history: StorageHistoryRepository,
    ) -> Self {
        Self {
            engine,
            alerts,
            storage_history,
        }
    }

    /// Computes a period's balance without evaluating or persisting
    /// anything; what a read-only view of the balance uses.
    #[instrument(skip(self), fields(%period, ?mode))]
    pub async fn view(
        &self,
        period: CalculationPeriod,
        mode: OrchestratorMode,
    ) -> Result<BalanceResult, WaterBalanceError> {
        let mut result = self.engine.compute(period).await?;

        if mode != OrchestratorMode::Audit {
            // Audit mode keeps full component_details; other modes trim
            // them to keep response payloads small for routine reporting.
            result.inflows.component_details.clear();
            result.outflows.component_details.clear();
        }

        Ok(result)
    }

    #[instrument(skip(self), fields(%period, ?mode))]
    pub async fn run(
        &self,
        period: CalculationPeriod,
        mode: OrchestratorMode,
    ) -> Result<(BalanceResult, Vec<Alert>), WaterBalanceError> {
        let result = self.view(period, mode).await?;

        let calculation_date = Utc::now().date_naive();
        let triggered = self.alerts.evaluate(&result, calculation_date).await?;
        let auto_resolved = self.alerts.auto_resolve(&result).await?;
        if auto_resolved > 0 {
            info!(auto_resolved, "auto-resolved alerts whose condition cleared");
        }

        if matches!(mode, OrchestratorMode::Regulator | OrchestratorMode::Audit) {
            self.persist_storage_history(&result, period).await?;
        }

        info!(summary = %result.summary(), "balance run complete");
        Ok((result, triggered))
    }

    /// Re-evaluates auto-resolvable alerts against a fresh computation
    /// without triggering new alerts or persisting storage history —
    /// the narrower sweep the background scheduler runs between full
    /// recompute cycles.
    #[instrument(skip(self), fields(%period))]
    pub async fn sweep_alerts(&self, period: CalculationPeriod) -> Result<u32, WaterBalanceError> {
        let result = self.engine.compute(period).await?;
        self.alerts.auto_resolve(&result).await
    }

    pub async fn list_active_alerts(&self) -> Result<Vec<Alert>, WaterBalanceError> {
        self.alerts.get_active_alerts().await
    }

    pub async fn acknowledge_alert(&self, alert_id: i64) -> Result<(), WaterBalanceError> {
        self.alerts.acknowledge(alert_id).await
    }

    pub async fn resolve_alert(&self, alert_id: i64, resolved_by: &str) -> Result<(), WaterBalanceError> {
        self.alerts.resolve(alert_id, resolved_by).await
    }

    async fn persist_storage_history(
        &self,
        result: &BalanceResult,
        period: CalculationPeriod,
    ) -> Result<(), WaterBalanceError> {
        for facility in &result.facilities {
            self.storage_history
                .record(
                    &facility.facility_code,
                    period.year(),
                    period.month() as i32,
                    facility.opening_m3,
                    facility.closing_m3,
                    DataSource::Calculated,
                )
                .await?;
        }
        Ok(())
    }
}
