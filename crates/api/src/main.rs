use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use complaint_desk_api::{
    app::{create_app, AppState},
    config::Config,
    jobs::{DailyReportJob, JobScheduler, OtpSweepJob, PoolMetricsJob},
    middleware::{init_metrics, logging::init_logging},
    services::admin_bootstrap::bootstrap_admin,
};
use domain::services::{Clock, SystemClock};
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config.logging);
    info!("Starting Complaint Desk API v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = init_metrics() {
        warn!(error = %e, "Prometheus exporter not installed; /metrics will be unavailable");
    }

    let pool = persistence::db::create_pool(&config.database.pool_settings())
        .await
        .context("Failed to connect to database")?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let stores = persistence::pg_stores(pool.clone());
    let outcome = bootstrap_admin(&stores, &config.admin).await?;
    if outcome.admin_created || outcome.key_created {
        info!(?outcome, "Admin bootstrap applied");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let addr = config.socket_addr();
    let report_hour = config.email.report_hour_utc;
    let state = AppState::new(config, stores, clock.clone())?;

    let mut scheduler = JobScheduler::new();
    scheduler.register(PoolMetricsJob::new(
        pool.clone(),
        state.notifications.registry().clone(),
    ));
    scheduler.register(OtpSweepJob::new(
        state.otp.clone(),
        state.auth.otp_limiter().clone(),
    ));
    scheduler.register(DailyReportJob::new(
        state.lifecycle.clone(),
        state.email.clone(),
        clock,
        report_hour,
    ));
    scheduler.start();

    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;
    pool.close().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
