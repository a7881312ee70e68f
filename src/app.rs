use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::cache::PersistentCache;
use crate::calculator::StorageCalculator;
use crate::config::Config;
use crate::db::{
    AlertRepository, AlertRuleRepository, ConstantsRepository, EnvironmentalRepository,
    FacilityRepository, FacilityTransferRepository, MonthlyParametersRepository,
    StorageHistoryRepository,
};
use crate::engine::BalanceEngine;
use crate::orchestrator::BalanceOrchestrator;
use crate::scheduler;
use crate::services::{AlertService, ConstantsService, FacilityService, MonthlyParametersService};
use crate::workbook::TimeSeriesRepository;

/// Application with all spawned background tasks and server.
///
/// Holds handles to every running task so the process can be observed
/// (or, eventually, gracefully shut down); today everything just runs
/// until the process exits.
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
    pub balance_scheduler_handle: JoinHandle<()>,
    pub alert_sweep_scheduler_handle: JoinHandle<()>,
}

impl Application {
    /// Builds every repository, service, and the orchestrator, then
    /// spawns the recompute scheduler, the alert sweep scheduler, and the
    /// HTTP API server.
    pub async fn build(config: Config, pool: PgPool) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");

        let time_series = Arc::new(TimeSeriesRepository::new(
            config.workbook_path.clone(),
            config.cache_dir.clone(),
        ));
        time_series.load().await?;

        let cache = Arc::new(PersistentCache::new(&config.cache_dir)?);
        let calculator = Arc::new(StorageCalculator::new(time_series.clone(), cache.clone()));

        let facility_repo = FacilityRepository::new(pool.clone());
        let constants_repo = ConstantsRepository::new(pool.clone());
        let monthly_params_repo = MonthlyParametersRepository::new(pool.clone());
        let environmental_repo = EnvironmentalRepository::new(pool.clone());
        let transfer_repo = FacilityTransferRepository::new(pool.clone());
        let storage_history_repo = StorageHistoryRepository::new(pool.clone());
        let alert_rule_repo = AlertRuleRepository::new(pool.clone());
        let alert_repo = AlertRepository::new(pool.clone());

        let facility_service = FacilityService::new(facility_repo, cache.clone(), time_series.clone());
        let constants_service = ConstantsService::new(constants_repo);
        let monthly_params_service = MonthlyParametersService::new(monthly_params_repo);
        let alert_service = AlertService::new(alert_rule_repo, alert_repo);

        constants_service.ensure_seeded().await?;

        let engine = BalanceEngine::new(
            calculator,
            time_series.clone(),
            facility_service.clone(),
            constants_service.clone(),
            monthly_params_service.clone(),
        );
        let orchestrator = Arc::new(BalanceOrchestrator::new(
            engine,
            alert_service,
            storage_history_repo,
        ));

        info!("Spawning background schedulers");

        let balance_scheduler_handle = {
            let orchestrator = orchestrator.clone();
            let interval = config.balance_recompute_interval_minutes;
            let mode = config.balance_mode;
            tokio::spawn(async move {
                scheduler::start_balance_scheduler(orchestrator, mode, interval).await;
            })
        };

        let alert_sweep_scheduler_handle = {
            let orchestrator = orchestrator.clone();
            let interval = config.alert_sweep_interval_minutes;
            let mode = config.balance_mode;
            tokio::spawn(async move {
                scheduler::start_alert_sweep_scheduler(orchestrator, mode, interval).await;
            })
        };

        let app_state = AppState {
            orchestrator,
            facility_service,
            constants_service,
            monthly_params_service,
            environmental_repo,
            transfer_repo,
        };
        let app = create_router(app_state).layer(TraceLayer::new_for_http());

        let addr = config.server_addr();
        info!("Starting HTTP server on {}", addr);

        let server_handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await
        });

        info!("Application initialized successfully");

        Ok(Self {
            server_handle,
            balance_scheduler_handle,
            alert_sweep_scheduler_handle,
        })
    }

    /// Runs until the server stops; schedulers run indefinitely in the
    /// background.
    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server_handle.await??;
        Ok(())
    }
}
