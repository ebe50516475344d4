use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &VigilConfig) -> Result<()> {
    validate_service_config(&config.service)?;
    validate_health_config(&config.health)?;
    validate_recovery_config(&config.recovery)?;
    validate_supervisor_config(&config.supervisor)?;
    validate_logging_config(&config.logging)?;
    validate_error_log_config(&config.error_log)?;

    Ok(())
}

fn validate_service_config(service: &ServiceConfig) -> Result<()> {
    if service.id.is_empty() {
        return Err(anyhow!("Service ID cannot be empty"));
    }

    if !service
        .id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(anyhow!(
            "Service ID can only contain alphanumeric characters, hyphens, and underscores: {}",
            service.id
        ));
    }

    if service.signature.trim().is_empty() {
        return Err(anyhow!("Service signature cannot be empty"));
    }

    for (name, command) in [
        ("dev_command", &service.dev_command),
        ("build_command", &service.build_command),
        ("production_command", &service.production_command),
    ] {
        if command.executable.trim().is_empty() {
            return Err(anyhow!("{} executable cannot be empty", name));
        }
    }

    for key in service.environment.keys() {
        if key.is_empty() {
            return Err(anyhow!("Environment variable name cannot be empty"));
        }

        if !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(anyhow!(
                "Environment variable name can only contain alphanumeric characters and underscores: {}",
                key
            ));
        }
    }

    Ok(())
}

fn validate_health_config(health: &HealthConfig) -> Result<()> {
    if !(health.url.starts_with("http://") || health.url.starts_with("https://")) {
        return Err(anyhow!(
            "Health URL must start with http:// or https://, got: {}",
            health.url
        ));
    }

    if health.timeout.is_zero() {
        return Err(anyhow!("Health check timeout must be greater than 0"));
    }

    if health.interval.is_zero() {
        return Err(anyhow!("Health check interval must be greater than 0"));
    }

    if health.timeout >= health.interval {
        return Err(anyhow!(
            "Health check timeout ({:?}) must be less than interval ({:?})",
            health.timeout,
            health.interval
        ));
    }

    Ok(())
}

fn validate_recovery_config(recovery: &RecoveryConfig) -> Result<()> {
    if recovery.max_attempts == 0 {
        return Err(anyhow!("Max restart attempts must be greater than 0"));
    }

    if recovery.max_attempts > 100 {
        return Err(anyhow!(
            "Max restart attempts too high (max 100): {}",
            recovery.max_attempts
        ));
    }

    Ok(())
}

fn validate_supervisor_config(supervisor: &SupervisorConfig) -> Result<()> {
    if supervisor.settle_timeout.is_zero() || supervisor.oneshot_settle_timeout.is_zero() {
        return Err(anyhow!("Settle timeout must be greater than 0"));
    }

    if supervisor.shutdown_grace.is_zero() {
        return Err(anyhow!("Shutdown grace period must be greater than 0"));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> Result<()> {
    match logging.level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => {
            return Err(anyhow!(
                "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
                logging.level
            ))
        }
    }

    if logging.log_dir.as_os_str().is_empty() {
        return Err(anyhow!("Log directory cannot be empty"));
    }

    Ok(())
}

fn validate_error_log_config(error_log: &ErrorLogConfig) -> Result<()> {
    if error_log.rotation.max_size_bytes == 0 {
        return Err(anyhow!("Log rotation size must be greater than 0"));
    }

    if error_log.dedup_window_secs == 0 {
        return Err(anyhow!("Deduplication window must be greater than 0"));
    }

    if error_log.dedup_window_secs > vigil_error_log::MAX_DEDUP_WINDOW_SECS {
        return Err(anyhow!(
            "Deduplication window must be at most {} seconds, got {}",
            vigil_error_log::MAX_DEDUP_WINDOW_SECS,
            error_log.dedup_window_secs
        ));
    }

    if let Some((severity, _)) = error_log.alert_thresholds.iter().find(|(_, t)| **t == 0) {
        return Err(anyhow!("Alert threshold for {} must be at least 1", severity));
    }

    if let Some(url) = &error_log.alerts.webhook_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!("Webhook URL must be http(s), got: {}", url));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_attempts() {
        let mut config = VigilConfig::default();
        config.recovery.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_bad_url() {
        let mut config = VigilConfig::default();
        config.health.url = "localhost:3000".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn test_rejects_empty_command() {
        let mut config = VigilConfig::default();
        config.service.build_command.executable = " ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("build_command"));
    }

    #[test]
    fn test_rejects_timeout_not_below_interval() {
        let mut config = VigilConfig::default();
        config.health.timeout = Duration::from_secs(30);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_rotation_size_and_threshold() {
        let mut config = VigilConfig::default();
        config.error_log.rotation.max_size_bytes = 0;
        assert!(validate_config(&config).is_err());

        let mut config = VigilConfig::default();
        config
            .error_log
            .alert_thresholds
            .insert(vigil_error_log::Severity::Warn, 0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_oversized_dedup_window() {
        let mut config = VigilConfig::default();
        config.error_log.dedup_window_secs = u64::MAX;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("Deduplication window"));

        config.error_log.dedup_window_secs = vigil_error_log::MAX_DEDUP_WINDOW_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut config = VigilConfig::default();
        config.logging.level = "loud".to_string();
        assert!(validate_config(&config).is_err());
    }
}
