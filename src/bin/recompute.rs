//! Admin CLI for recomputing one or more periods outside of the
//! scheduler's regular cadence (clap + indicatif, direct repository
//! wiring, no HTTP server).
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info};

use water_balance_engine::cache::PersistentCache;
use water_balance_engine::calculator::StorageCalculator;
use water_balance_engine::db::{
    AlertRepository, AlertRuleRepository, ConstantsRepository, FacilityRepository,
    MonthlyParametersRepository, StorageHistoryRepository,
};
use water_balance_engine::domain::CalculationPeriod;
use water_balance_engine::engine::BalanceEngine;
use water_balance_engine::orchestrator::{BalanceOrchestrator, OrchestratorMode};
use water_balance_engine::services::{
    AlertService, ConstantsService, FacilityService, MonthlyParametersService,
};
use water_balance_engine::workbook::TimeSeriesRepository;

#[derive(Parser)]
#[command(name = "recompute")]
#[command(about = "Recompute the water balance for one or more periods", long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(long, env)]
    database_url: String,

    /// Path to the source workbook
    #[arg(long, env = "WORKBOOK_PATH", default_value = "data/water_balance.xlsx")]
    workbook_path: String,

    /// Persistent cache directory
    #[arg(long, env = "CACHE_DIR", default_value = "data/cache")]
    cache_dir: String,

    /// Calendar year to recompute
    #[arg(long)]
    year: i32,

    /// Single calendar month (1-12); omit to recompute the whole year
    #[arg(long)]
    month: Option<u32>,

    /// Run mode affecting clamping/persistence policy
    #[arg(long, value_enum, default_value_t = CliMode::Regulator)]
    mode: CliMode,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliMode {
    Regulator,
    Internal,
    Audit,
}

impl From<CliMode> for OrchestratorMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Regulator => OrchestratorMode::Regulator,
            CliMode::Internal => OrchestratorMode::Internal,
            CliMode::Audit => OrchestratorMode::Audit,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cli.database_url)
        .await?;

    let time_series = Arc::new(TimeSeriesRepository::new(
        cli.workbook_path.clone(),
        cli.cache_dir.clone(),
    ));
    time_series.load().await?;

    let cache = Arc::new(PersistentCache::new(&cli.cache_dir)?);
    let calculator = Arc::new(StorageCalculator::new(time_series.clone(), cache.clone()));

    let facility_service = FacilityService::new(
        FacilityRepository::new(pool.clone()),
        cache.clone(),
        time_series.clone(),
    );
    let constants_service = ConstantsService::new(ConstantsRepository::new(pool.clone()));
    constants_service.ensure_seeded().await?;
    let monthly_params_service = MonthlyParametersService::new(MonthlyParametersRepository::new(pool.clone()));
    let alert_service = AlertService::new(
        AlertRuleRepository::new(pool.clone()),
        AlertRepository::new(pool.clone()),
    );

    let engine = BalanceEngine::new(
        calculator,
        time_series.clone(),
        facility_service.clone(),
        constants_service.clone(),
        monthly_params_service,
    );
    let orchestrator = BalanceOrchestrator::new(
        engine,
        alert_service,
        StorageHistoryRepository::new(pool.clone()),
    );

    let months: Vec<u32> = match cli.month {
        Some(month) => vec![month],
        None => (1..=12).collect(),
    };
    let mode: OrchestratorMode = cli.mode.into();

    let progress = ProgressBar::new(months.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut failures = 0;
    for month in months {
        let period = CalculationPeriod::new(cli.year, month)?;
        progress.set_message(period.period_short());
        match orchestrator.run(period, mode).await {
            Ok((result, alerts)) => {
                info!(
                    "{}: {} ({} alerts triggered)",
                    period.period_short(),
                    result.summary(),
                    alerts.len()
                );
            }
            Err(e) => {
                error!("{}: recompute failed: {}", period.period_short(), e);
                failures += 1;
            }
        }
        progress.inc(1);
    }
    progress.finish_with_message("done");

    if failures > 0 {
        return Err(format!("{failures} period(s) failed to recompute").into());
    }
    Ok(())
}
