//! EventDesk
//!
//! Main application entry point

use std::time::Duration;
use anyhow::Context;
use tracing::{error, info, warn};

use EventDesk::{
    config::Settings,
    database::DatabaseService,
    services::ServiceFactory,
    utils::logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("failed to load settings")?;
    settings.validate()?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", EventDesk::info());

    info!(backend = ?settings.database.backend, "Connecting to storage...");
    let database = DatabaseService::connect(&settings.database).await?;

    info!("Initializing services...");
    let services = ServiceFactory::new(&settings, database)?;

    let health = services.health_check().await;
    for issue in health.get_issues() {
        warn!(issue = %issue, "Service health issue");
    }
    if !health.is_healthy() {
        anyhow::bail!("critical services are unhealthy");
    }

    let sweep = spawn_reconciliation(&settings, services.clone());

    info!("EventDesk is ready");
    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;

    if let Some(sweep) = sweep {
        sweep.abort();
    }
    info!("EventDesk has been shut down.");

    Ok(())
}

/// Periodically recount confirmed requests of published limited events
fn spawn_reconciliation(settings: &Settings, services: ServiceFactory) -> Option<tokio::task::JoinHandle<()>> {
    let period = settings.admission.reconcile_interval_seconds;
    if period == 0 {
        info!("Confirmed counter reconciliation disabled");
        return None;
    }
    let concurrency = settings.admission.reconcile_concurrency;

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(period));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match services.admission.reconcile_all(concurrency).await {
                Ok(report) => info!(
                    checked = report.checked,
                    drifted = report.drifted,
                    failed = report.failed,
                    "Reconciliation sweep completed"
                ),
                Err(e) if e.is_recoverable() => warn!(error = %e, "Reconciliation sweep failed, retrying next tick"),
                Err(e) => error!(error = %e, severity = %e.severity(), "Reconciliation sweep failed"),
            }
        }
    }))
}
