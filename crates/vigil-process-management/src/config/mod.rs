use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vigil_error_log::ErrorLogConfig;
use vigil_resource_limits::DEFAULT_FILE_WATCH_THRESHOLD;

pub mod validation;

/// Config file picked up from the project root when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "vigil.yaml";

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub error_log: ErrorLogConfig,
}

/// The supervised web service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_id")]
    pub id: String,
    /// Project root. Relative paths elsewhere resolve against it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    /// Command-line fragment identifying the running service.
    #[serde(default = "default_signature")]
    pub signature: String,
    #[serde(default = "default_dev_command")]
    pub dev_command: CommandConfig,
    #[serde(default = "default_build_command")]
    pub build_command: CommandConfig,
    #[serde(default = "default_production_command")]
    pub production_command: CommandConfig,
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

/// An executable and its arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub executable: String,
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl CommandConfig {
    pub fn new(executable: impl Into<String>, arguments: &[&str]) -> Self {
        Self {
            executable: executable.into(),
            arguments: arguments.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for CommandConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.executable)?;
        for arg in &self.arguments {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Health probing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_url")]
    pub url: String,
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub timeout: Duration,
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub interval: Duration,
    /// Inotify instance count above which the dev server is not used.
    #[serde(default = "default_file_watch_threshold")]
    pub file_watch_threshold: u64,
}

/// Restart budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_restart_delay", with = "duration_serde")]
    pub restart_delay: Duration,
}

/// Process control timings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Wait after spawning before a daemon start is considered successful.
    #[serde(default = "default_settle_timeout", with = "duration_serde")]
    pub settle_timeout: Duration,
    /// Same, for the one-shot health check.
    #[serde(default = "default_oneshot_settle_timeout", with = "duration_serde")]
    pub oneshot_settle_timeout: Duration,
    #[serde(default = "default_shutdown_grace", with = "duration_serde")]
    pub shutdown_grace: Duration,
    /// Pause between `server-monitor stop` and `start` on restart.
    #[serde(default = "default_daemon_restart_delay", with = "duration_serde")]
    pub daemon_restart_delay: Duration,
}

/// Operational logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

/// Files under the log directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VigilPaths {
    pub log_dir: PathBuf,
    pub pid_marker: PathBuf,
    pub monitor_log: PathBuf,
    pub health_check_log: PathBuf,
    pub server_log: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            id: default_service_id(),
            working_directory: None,
            signature: default_signature(),
            dev_command: default_dev_command(),
            build_command: default_build_command(),
            production_command: default_production_command(),
            environment: HashMap::new(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            url: default_health_url(),
            timeout: default_probe_timeout(),
            interval: default_poll_interval(),
            file_watch_threshold: default_file_watch_threshold(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            restart_delay: default_restart_delay(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            settle_timeout: default_settle_timeout(),
            oneshot_settle_timeout: default_oneshot_settle_timeout(),
            shutdown_grace: default_shutdown_grace(),
            daemon_restart_delay: default_daemon_restart_delay(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: default_log_dir(),
        }
    }
}

impl VigilConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: VigilConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

        validation::validate_config(&config)?;

        Ok(config)
    }

    /// Explicit file if given, else `vigil.yaml` in the current directory if
    /// present, else defaults. Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load_from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.error_log.alerts = self.error_log.alerts.clone().with_env_webhook();
    }

    /// Project root: the configured working directory, else the current one.
    pub fn project_root(&self) -> PathBuf {
        self.service
            .working_directory
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root().join(path)
        }
    }

    pub fn paths(&self) -> VigilPaths {
        let log_dir = self.resolve(&self.logging.log_dir);
        VigilPaths {
            pid_marker: log_dir.join("monitor.pid"),
            monitor_log: log_dir.join("monitor.log"),
            health_check_log: log_dir.join("health-check.log"),
            server_log: log_dir.join("server.log"),
            log_dir,
        }
    }
}

fn default_service_id() -> String {
    "metabalance".to_string()
}

fn default_signature() -> String {
    "server/_core/index.ts".to_string()
}

fn default_dev_command() -> CommandConfig {
    CommandConfig::new("pnpm", &["run", "dev"])
}

fn default_build_command() -> CommandConfig {
    CommandConfig::new("pnpm", &["run", "build"])
}

fn default_production_command() -> CommandConfig {
    CommandConfig::new("npm", &["exec", "tsx", "server/_core/index.ts"])
}

fn default_health_url() -> String {
    "http://localhost:3000/".to_string()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_file_watch_threshold() -> u64 {
    DEFAULT_FILE_WATCH_THRESHOLD
}

fn default_max_attempts() -> u32 {
    3
}

fn default_restart_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_settle_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_oneshot_settle_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(10)
}

fn default_daemon_restart_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

// Custom serialization for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if let Some(num_str) = s.strip_suffix("ms") {
            let millis: u64 = num_str
                .trim()
                .parse()
                .map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_millis(millis))
        } else if let Some(num_str) = s.strip_suffix('s') {
            let secs: u64 = num_str
                .trim()
                .parse()
                .map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else {
            Err(format!("Duration must end with 's' or 'ms': {}", s))
        }
    }
}
