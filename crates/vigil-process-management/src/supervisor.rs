//! ProcessSupervisor - lifecycle control of the single managed service
//!
//! Owns at most one live child at a time and drives it through
//! STOPPED -> STARTING -> RUNNING -> STOPPING -> STOPPED. An unexpected exit
//! while RUNNING moves straight back to STOPPED and is recorded.

use crate::config::{ServiceConfig, VigilConfig};
use crate::launcher::{ChildHandle, ExitInfo, LaunchSpec, ProcessLauncher, StartMode};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};
use vigil_common::{ProcessError, ProcessResult};
use vigil_error_log::{Category, ErrorLogger, LogOptions, Severity};
use vigil_process::{find_by_signature, terminate_with_grace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// The live managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagedService {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub mode: StartMode,
}

/// Commands for each start mode.
#[derive(Debug, Clone)]
pub struct ServiceCommands {
    pub dev: LaunchSpec,
    pub build: LaunchSpec,
    pub production: LaunchSpec,
}

impl ServiceCommands {
    pub fn from_config(service: &ServiceConfig) -> Self {
        Self {
            dev: LaunchSpec::from_command(&service.dev_command, service),
            build: LaunchSpec::from_command(&service.build_command, service),
            production: LaunchSpec::from_command(&service.production_command, service),
        }
    }

    pub fn for_mode(&self, mode: StartMode) -> &LaunchSpec {
        match mode {
            StartMode::Normal => &self.dev,
            StartMode::DegradedRebuilt => &self.production,
        }
    }
}

/// Timings and policies for the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Wait after spawning; still alive afterwards counts as started.
    pub settle: Duration,
    /// Time allowed between SIGTERM and SIGKILL.
    pub grace: Duration,
    /// Pause between stop and start on restart.
    pub restart_delay: Duration,
    /// When set, processes matching this signature that we do not own are
    /// terminated before each restart.
    pub reap_signature: Option<String>,
}

impl SupervisorSettings {
    /// Daemon settings: long settle, no stray reaping.
    pub fn daemon(config: &VigilConfig) -> Self {
        Self {
            settle: config.supervisor.settle_timeout,
            grace: config.supervisor.shutdown_grace,
            restart_delay: config.recovery.restart_delay,
            reap_signature: None,
        }
    }

    /// One-shot health check settings: short settle, strays are reaped since
    /// the service was started by someone else.
    pub fn oneshot(config: &VigilConfig) -> Self {
        Self {
            settle: config.supervisor.oneshot_settle_timeout,
            grace: config.supervisor.shutdown_grace,
            restart_delay: config.recovery.restart_delay,
            reap_signature: Some(config.service.signature.clone()),
        }
    }
}

pub struct ProcessSupervisor {
    id: String,
    launcher: Arc<dyn ProcessLauncher>,
    commands: ServiceCommands,
    settings: SupervisorSettings,
    state: SupervisorState,
    child: Option<Box<dyn ChildHandle>>,
    current: Option<ManagedService>,
    last_exit: Option<ExitInfo>,
    logger: Option<Arc<ErrorLogger>>,
}

impl ProcessSupervisor {
    pub fn new(
        id: impl Into<String>,
        launcher: Arc<dyn ProcessLauncher>,
        commands: ServiceCommands,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            id: id.into(),
            launcher,
            commands,
            settings,
            state: SupervisorState::Stopped,
            child: None,
            current: None,
            last_exit: None,
            logger: None,
        }
    }

    /// Record unexpected exits through the error logger.
    pub fn with_error_logger(mut self, logger: Arc<ErrorLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn current(&self) -> Option<ManagedService> {
        self.current
    }

    pub fn last_exit(&self) -> Option<ExitInfo> {
        self.last_exit
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Start the service. A live service is returned as-is; a second child
    /// is never spawned.
    pub async fn start(&mut self, mode: StartMode) -> ProcessResult<ManagedService> {
        self.poll_exit().await;
        if let Some(existing) = self.current {
            warn!(
                "Service {} already running (PID: {}), not starting another",
                self.id, existing.pid
            );
            return Ok(existing);
        }

        self.state = SupervisorState::Starting;
        info!("Starting service {} in {} mode", self.id, mode);

        if mode == StartMode::DegradedRebuilt {
            info!("Building production bundle...");
            if let Err(e) = self.launcher.build(&self.commands.build).await {
                error!("Build failed: {}", e);
                self.state = SupervisorState::Stopped;
                return Err(e);
            }
        }

        let spec = self.commands.for_mode(mode);
        let mut child = match self.launcher.spawn(spec) {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn {}: {}", spec, e);
                self.state = SupervisorState::Stopped;
                return Err(e);
            }
        };
        let pid = child.pid();
        let started_at = Utc::now();
        debug!("Waiting {:?} for {} (PID: {}) to settle", self.settings.settle, self.id, pid);

        sleep(self.settings.settle).await;

        match child.try_wait() {
            Ok(Some(exit)) => {
                self.state = SupervisorState::Stopped;
                self.last_exit = Some(exit);
                error!("Service {} (PID: {}) exited during startup: {}", self.id, pid, exit);
                return Err(ProcessError::start_failed(
                    &self.id,
                    format!("exited during startup with {}", exit),
                ));
            }
            Ok(None) => {}
            Err(e) => warn!("Could not check status of PID {}: {}", pid, e),
        }

        let service = ManagedService {
            pid,
            started_at,
            mode,
        };
        self.child = Some(child);
        self.current = Some(service);
        self.state = SupervisorState::Running;
        info!("Service {} running in {} mode (PID: {})", self.id, mode, pid);
        Ok(service)
    }

    /// Start in `mode`; if a NORMAL start fails, try DEGRADED_REBUILT once.
    pub async fn start_with_fallback(&mut self, mode: StartMode) -> ProcessResult<ManagedService> {
        match self.start(mode).await {
            Err(e) if mode == StartMode::Normal => {
                warn!(
                    "Normal start failed ({}), falling back to {} mode",
                    e,
                    StartMode::DegradedRebuilt
                );
                self.start(StartMode::DegradedRebuilt).await
            }
            other => other,
        }
    }

    /// Stop the service: SIGTERM, wait up to the grace period, then SIGKILL.
    /// A no-op when nothing runs.
    pub async fn stop(&mut self) -> ProcessResult<()> {
        let Some(mut child) = self.child.take() else {
            debug!("Service {} not running, nothing to stop", self.id);
            self.state = SupervisorState::Stopped;
            return Ok(());
        };

        self.state = SupervisorState::Stopping;
        let pid = child.pid();
        info!("Stopping service {} (PID: {})", self.id, pid);

        if let Err(e) = child.terminate() {
            warn!("Failed to send SIGTERM to {}: {}", pid, e);
        }

        let exit = match timeout(self.settings.grace, child.wait()).await {
            Ok(Ok(exit)) => exit,
            Ok(Err(e)) => {
                self.child = Some(child);
                self.state = SupervisorState::Running;
                return Err(e);
            }
            Err(_) => {
                warn!(
                    "Service {} did not exit within {:?}, force killing",
                    self.id, self.settings.grace
                );
                if let Err(e) = child.kill() {
                    error!("Failed to kill process {}: {}", pid, e);
                    self.child = Some(child);
                    self.state = SupervisorState::Running;
                    return Err(e);
                }
                match child.wait().await {
                    Ok(exit) => exit,
                    Err(e) => {
                        self.child = Some(child);
                        self.state = SupervisorState::Running;
                        return Err(e);
                    }
                }
            }
        };

        self.last_exit = Some(exit);
        self.current = None;
        self.state = SupervisorState::Stopped;
        info!("Service {} stopped ({})", self.id, exit);
        Ok(())
    }

    /// Stop, pause, start. The new child is spawned only after the old one
    /// has been reaped.
    pub async fn restart(&mut self, mode: StartMode) -> ProcessResult<ManagedService> {
        self.stop_for_restart().await?;
        self.start(mode).await
    }

    /// Like [`restart`](Self::restart), with NORMAL falling back to
    /// DEGRADED_REBUILT.
    pub async fn restart_with_fallback(
        &mut self,
        mode: StartMode,
    ) -> ProcessResult<ManagedService> {
        self.stop_for_restart().await?;
        self.start_with_fallback(mode).await
    }

    async fn stop_for_restart(&mut self) -> ProcessResult<()> {
        self.stop().await?;
        self.reap_strays().await;
        sleep(self.settings.restart_delay).await;
        Ok(())
    }

    /// Terminate service processes we do not own. No-op unless a reap
    /// signature is configured.
    pub async fn reap_strays(&mut self) {
        let Some(signature) = self.settings.reap_signature.clone() else {
            return;
        };
        let own_pid = self.current.map(|s| s.pid);

        let strays = match tokio::task::spawn_blocking(move || find_by_signature(&signature)).await
        {
            Ok(found) => found,
            Err(e) => {
                warn!("Process scan failed: {}", e);
                return;
            }
        };

        for stray in strays.into_iter().filter(|p| Some(p.pid) != own_pid) {
            info!("Terminating stray service process {}: {}", stray.pid, stray.command_line);
            if let Err(e) = terminate_with_grace(stray.pid, self.settings.grace).await {
                warn!("Failed to terminate stray process {}: {}", stray.pid, e);
            }
        }
    }

    /// Detect an exit we did not ask for. Returns its details once.
    pub async fn poll_exit(&mut self) -> Option<ExitInfo> {
        let child = self.child.as_mut()?;
        let pid = child.pid();

        let exit = match child.try_wait() {
            Ok(Some(exit)) => exit,
            Ok(None) => return None,
            Err(e) => {
                warn!("Could not check status of PID {}: {}", pid, e);
                return None;
            }
        };

        let mode = self.current.map(|s| s.mode);
        self.child = None;
        self.current = None;
        self.last_exit = Some(exit);
        self.state = SupervisorState::Stopped;

        warn!(
            "Service {} (PID: {}) exited unexpectedly with code {:?}, signal {:?}",
            self.id, pid, exit.code, exit.signal
        );

        if let Some(logger) = &self.logger {
            let mut options = LogOptions::new(Severity::Error, Category::Server)
                .with_context("pid", pid)
                .with_context("code", exit.code)
                .with_context("signal", exit.signal);
            if let Some(mode) = mode {
                options = options.with_context("mode", mode.to_string());
            }
            logger
                .log(
                    "Server process crashed, will attempt restart on next health check",
                    options,
                )
                .await;
        }

        Some(exit)
    }
}
