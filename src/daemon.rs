//! Server monitor daemon: singleton start, stop, restart and status.
//!
//! Every command returns the process exit code; user-facing results are
//! printed to stdout.

use crate::errors::Result;
use crate::runtime;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};
use vigil_error_log::{Category, LogOptions, Severity};
use vigil_monitoring::HealthProbe;
use vigil_process::{process_exists, terminate_gracefully};
use vigil_process_file::PidMarker;
use vigil_process_management::{SupervisorSettings, VigilConfig, VigilPaths};

pub struct DaemonLifecycle {
    config: VigilConfig,
    paths: VigilPaths,
    marker: PidMarker,
}

impl DaemonLifecycle {
    pub fn new(config: VigilConfig) -> Self {
        let paths = config.paths();
        let marker = PidMarker::new(&paths.pid_marker);
        Self {
            config,
            paths,
            marker,
        }
    }

    pub fn marker(&self) -> &PidMarker {
        &self.marker
    }

    /// Run the monitor in the foreground until SIGTERM or SIGINT.
    pub async fn start(&self) -> Result<i32> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match runtime::shutdown_signal().await {
                Ok(signal) => {
                    info!("Received {}. Shutting down gracefully...", signal);
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => {
                    // Keep the sender alive so the loop is not stopped.
                    error!("Failed to install signal handlers: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        });

        self.start_with_shutdown(shutdown_rx).await
    }

    /// Run the monitor until `shutdown` turns true or its sender is dropped,
    /// then stop the service and delete the PID marker.
    pub async fn start_with_shutdown(&self, shutdown: watch::Receiver<bool>) -> Result<i32> {
        if let Some(pid) = self.marker.live_pid().await {
            println!("Monitor is already running (PID: {})", pid);
            return Ok(1);
        }

        let pid = self.marker.write_current().await?;
        info!("=== MetaBalance Server Monitor Started (PID: {}) ===", pid);

        let result = self.supervise(shutdown).await;

        if let Err(e) = self.marker.remove().await {
            warn!("Failed to remove PID marker: {}", e);
        }

        match result {
            Ok(()) => {
                info!("Monitor shutdown complete");
                Ok(0)
            }
            Err(e) => {
                error!("Monitor failed: {}", e);
                Err(e)
            }
        }
    }

    async fn supervise(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let logger = runtime::error_logger(&self.config, &self.paths);
        let prober: Arc<dyn HealthProbe> = Arc::new(runtime::prober(&self.config)?);
        let mut recovery = runtime::recovery_loop(
            &self.config,
            SupervisorSettings::daemon(&self.config),
            prober,
            runtime::launcher(&self.paths),
            logger.clone(),
        );

        if let Err(e) = recovery.start_service().await {
            error!("Failed to start server: {}", e);
            logger
                .log(
                    format!("Failed to start server: {}", e),
                    LogOptions::new(Severity::Error, Category::Server),
                )
                .await;
        }

        recovery.run(shutdown).await;

        if let Err(e) = recovery.supervisor_mut().stop().await {
            error!("Error stopping server: {}", e);
        }
        Ok(())
    }

    /// Signal the running monitor. Does not wait for it to exit.
    pub async fn stop(&self) -> i32 {
        match self.signal_monitor().await {
            Ok(pid) => {
                info!("Sent SIGTERM to monitor (PID: {})", pid);
                println!("Monitor stopped");
                0
            }
            Err(reason) => {
                eprintln!("Failed to stop monitor: {}", reason);
                println!("Failed to stop monitor");
                1
            }
        }
    }

    async fn signal_monitor(&self) -> std::result::Result<u32, String> {
        let pid = match self.marker.read().await {
            Ok(Some(pid)) => pid,
            Ok(None) => return Err("no PID marker".to_string()),
            Err(e) => return Err(e.to_string()),
        };

        if !process_exists(pid) {
            if let Err(e) = self.marker.remove().await {
                warn!("Failed to remove stale PID marker: {}", e);
            }
            return Err(format!("process {} is not running", pid));
        }

        terminate_gracefully(pid).map_err(|e| e.to_string())?;
        Ok(pid)
    }

    /// Stop, wait the daemon restart delay, start.
    pub async fn restart(&self) -> Result<i32> {
        self.stop().await;
        sleep(self.config.supervisor.daemon_restart_delay).await;
        self.start().await
    }

    pub async fn status(&self) -> Result<i32> {
        let Some(pid) = self.marker.live_pid().await else {
            println!("Monitor is not running");
            return Ok(0);
        };

        println!("Monitor is running (PID: {})", pid);
        match runtime::prober(&self.config) {
            Ok(prober) => {
                let health = prober.check().await;
                println!(
                    "Server health: {}",
                    if health.healthy { "OK" } else { "UNHEALTHY" }
                );
            }
            Err(e) => {
                warn!("Status check failed: {}", e);
                println!("Monitor is running but status check failed");
            }
        }
        Ok(0)
    }
}
