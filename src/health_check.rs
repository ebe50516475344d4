//! Stand-alone health check: probe the service and restart it if needed.

use crate::errors::Result;
use crate::runtime;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use vigil_monitoring::HealthProbe;
use vigil_process_management::{RecoveryLoop, RunOnceOutcome, SupervisorSettings, VigilConfig};

fn build(config: &VigilConfig) -> Result<RecoveryLoop> {
    let paths = config.paths();
    let prober: Arc<dyn HealthProbe> = Arc::new(runtime::prober(config)?);
    Ok(runtime::recovery_loop(
        config,
        SupervisorSettings::oneshot(config),
        prober,
        runtime::launcher(&paths),
        runtime::error_logger(config, &paths),
    ))
}

/// Check once and recover. Exit code 1 when the restart budget runs out.
pub async fn run_once(config: &VigilConfig) -> Result<i32> {
    let mut recovery = build(config)?;
    info!("Checking server health at {}", config.health.url);

    match recovery.run_once().await {
        RunOnceOutcome::Healthy => {
            info!("Server is healthy");
            Ok(0)
        }
        RunOnceOutcome::Exhausted => {
            error!("Server could not be recovered");
            Ok(1)
        }
    }
}

/// Check every interval until SIGINT or SIGTERM. A service started here
/// keeps running after exit.
pub async fn run_watch(config: &VigilConfig) -> Result<i32> {
    let mut recovery = build(config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match runtime::shutdown_signal().await {
            Ok(signal) => {
                info!("Received {}, stopping health checks", signal);
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!("Failed to install signal handlers: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    recovery.run(shutdown_rx).await;
    Ok(0)
}
