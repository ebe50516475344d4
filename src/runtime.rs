//! Builds the long-lived pieces from a loaded [`VigilConfig`].

use crate::errors::Result;
use std::sync::Arc;
use vigil_error_log::{ErrorLogger, ServiceOutput};
use vigil_monitoring::{HealthProbe, HealthProber};
use vigil_process_management::{
    ProcessLauncher, ProcessSupervisor, RecoveryLoop, RestartBudget, ServiceCommands,
    SupervisorSettings, TokioLauncher, VigilConfig, VigilPaths,
};

/// Error logger for the supervisor processes. Console echo is off because
/// the tracing console layer already reports these events.
pub fn error_logger(config: &VigilConfig, paths: &VigilPaths) -> Arc<ErrorLogger> {
    Arc::new(ErrorLogger::from_config(&config.error_log, &paths.log_dir).with_console_echo(false))
}

pub fn prober(config: &VigilConfig) -> Result<HealthProber> {
    Ok(HealthProber::new(
        config.service.signature.clone(),
        config.health.url.clone(),
        config.health.timeout,
        config.health.file_watch_threshold,
    )?)
}

/// Launcher writing the service's output to `server.log`.
pub fn launcher(paths: &VigilPaths) -> Arc<dyn ProcessLauncher> {
    Arc::new(TokioLauncher::new(Some(ServiceOutput::new(&paths.server_log))))
}

pub fn recovery_loop(
    config: &VigilConfig,
    settings: SupervisorSettings,
    prober: Arc<dyn HealthProbe>,
    launcher: Arc<dyn ProcessLauncher>,
    logger: Arc<ErrorLogger>,
) -> RecoveryLoop {
    let supervisor = ProcessSupervisor::new(
        config.service.id.clone(),
        launcher,
        ServiceCommands::from_config(&config.service),
        settings,
    )
    .with_error_logger(logger.clone());

    RecoveryLoop::new(
        prober,
        supervisor,
        RestartBudget::new(config.recovery.max_attempts),
        logger,
        config.health.interval,
        config.recovery.restart_delay,
    )
}

/// Resolves on SIGTERM or SIGINT with the signal's name.
pub async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = terminate.recv() => Ok("SIGTERM"),
            _ = interrupt.recv() => Ok("SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("Ctrl-C")
    }
}
