//! Periodic health checking with bounded restarts.

use crate::launcher::StartMode;
use crate::lifecycle::{BudgetDecision, RestartBudget};
use crate::supervisor::{ManagedService, ProcessSupervisor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use vigil_common::ProcessResult;
use vigil_error_log::{Category, ErrorLogger, LogOptions, Severity};
use vigil_monitoring::HealthProbe;

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Healthy,
    /// Healthy again after `after_failures` failed checks.
    Recovered { after_failures: u32 },
    /// A restart was performed; `verified` is the follow-up check result.
    Restarted { mode: StartMode, verified: bool },
    RestartFailed { reason: String },
    /// Budget used up, no restart attempted.
    Exhausted { first: bool },
}

impl TickOutcome {
    /// True when the service ended the tick known to be healthy.
    pub fn is_healthy(&self) -> bool {
        matches!(
            self,
            Self::Healthy | Self::Recovered { .. } | Self::Restarted { verified: true, .. }
        )
    }
}

/// Final result of a one-shot run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOnceOutcome {
    Healthy,
    Exhausted,
}

pub struct RecoveryLoop {
    prober: Arc<dyn HealthProbe>,
    supervisor: ProcessSupervisor,
    budget: RestartBudget,
    logger: Arc<ErrorLogger>,
    interval: Duration,
    restart_delay: Duration,
}

impl RecoveryLoop {
    pub fn new(
        prober: Arc<dyn HealthProbe>,
        supervisor: ProcessSupervisor,
        budget: RestartBudget,
        logger: Arc<ErrorLogger>,
        interval: Duration,
        restart_delay: Duration,
    ) -> Self {
        Self {
            prober,
            supervisor,
            budget,
            logger,
            interval,
            restart_delay,
        }
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut ProcessSupervisor {
        &mut self.supervisor
    }

    pub fn budget(&self) -> &RestartBudget {
        &self.budget
    }

    async fn select_mode(&self) -> StartMode {
        if self.prober.check_resource_headroom().await {
            StartMode::Normal
        } else {
            warn!("File watcher headroom exhausted, using {} mode", StartMode::DegradedRebuilt);
            StartMode::DegradedRebuilt
        }
    }

    /// Initial start for the daemon. Mode follows resource headroom.
    pub async fn start_service(&mut self) -> ProcessResult<ManagedService> {
        let mode = self.select_mode().await;
        self.supervisor.start_with_fallback(mode).await
    }

    /// One health check and, if needed, one restart.
    pub async fn tick(&mut self) -> TickOutcome {
        if let Some(exit) = self.supervisor.poll_exit().await {
            debug!("Service exited since last check ({})", exit);
        }

        let status = self.prober.check().await;
        if status.healthy {
            return match self.budget.record_success() {
                Some(after_failures) => {
                    info!("Server recovered after {} failed checks", after_failures);
                    self.logger
                        .log(
                            "Server recovered",
                            LogOptions::new(Severity::Info, Category::Server)
                                .with_context("failed_checks", after_failures),
                        )
                        .await;
                    TickOutcome::Recovered { after_failures }
                }
                None => {
                    debug!("Server is healthy");
                    TickOutcome::Healthy
                }
            };
        }

        let reason = status
            .reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        warn!("Server is unhealthy: {}", reason);
        self.logger
            .log(
                "Server health check failed",
                LogOptions::new(Severity::Warn, Category::Server).with_context("reason", reason.clone()),
            )
            .await;

        match self.budget.record_failure() {
            BudgetDecision::Exhausted { first } => {
                if first {
                    error!(
                        "Max restart attempts ({}) reached, manual intervention required",
                        self.budget.max_attempts()
                    );
                    self.logger
                        .log(
                            "Max restart attempts reached, manual intervention required",
                            LogOptions::new(Severity::Fatal, Category::Server)
                                .with_context("max_attempts", self.budget.max_attempts())
                                .with_context("reason", reason),
                        )
                        .await;
                }
                TickOutcome::Exhausted { first }
            }
            BudgetDecision::Restart { attempt } => self.restart(attempt).await,
        }
    }

    async fn restart(&mut self, attempt: u32) -> TickOutcome {
        let mode = self.select_mode().await;
        info!(
            "Restarting server (attempt {}/{}) in {} mode",
            attempt,
            self.budget.max_attempts(),
            mode
        );

        let service = match self.supervisor.restart_with_fallback(mode).await {
            Ok(service) => service,
            Err(e) => {
                error!("Failed to restart server: {}", e);
                self.logger
                    .log(
                        format!("Failed to restart server: {}", e),
                        LogOptions::new(Severity::Error, Category::Server)
                            .with_context("attempt", attempt),
                    )
                    .await;
                return TickOutcome::RestartFailed {
                    reason: e.to_string(),
                };
            }
        };

        let verified = self.prober.check().await.healthy;
        if verified {
            info!("Server restarted successfully (PID: {})", service.pid);
            self.budget.record_success();
            self.logger
                .log(
                    "Server restarted successfully",
                    LogOptions::new(Severity::Info, Category::Server)
                        .with_context("pid", service.pid)
                        .with_context("mode", service.mode.to_string()),
                )
                .await;
        } else {
            error!("Server restart verification failed (PID: {})", service.pid);
            self.logger
                .log(
                    "Server restart verification failed",
                    LogOptions::new(Severity::Error, Category::Server)
                        .with_context("pid", service.pid)
                        .with_context("mode", service.mode.to_string())
                        .with_context("attempt", attempt),
                )
                .await;
        }

        TickOutcome::Restarted {
            mode: service.mode,
            verified,
        }
    }

    /// Tick back to back until healthy or out of restarts.
    pub async fn run_once(&mut self) -> RunOnceOutcome {
        loop {
            let outcome = self.tick().await;
            if outcome.is_healthy() {
                return RunOnceOutcome::Healthy;
            }
            if let TickOutcome::Exhausted { .. } = outcome {
                return RunOnceOutcome::Exhausted;
            }
            sleep(self.restart_delay).await;
        }
    }

    /// Tick every interval until `shutdown` flips to true. A tick in progress
    /// always completes.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Health monitoring started (interval {:?})", self.interval);
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.tick().await;

            tokio::select! {
                _ = sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Health monitoring stopped");
    }
}
