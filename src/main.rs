use sqlx::postgres::PgPoolOptions;
use tracing::{info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use water_balance_engine::app::Application;
use water_balance_engine::config::Config;
use water_balance_engine::logging;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let file_layer = logging::init_file_layer(
        "logs/water-balance.log",
        &config.logging_level,
        config.logging_retention_days,
    )?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,water_balance_engine=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(file_layer)
        .init();

    info!("Starting water balance engine with config: {:?}", config);

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    info!("Database connection established");

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations completed");

    let application = Application::build(config, pool).await?;
    application.run_until_stopped().await?;

    Ok(())
}
