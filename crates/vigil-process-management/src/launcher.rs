//! Child process launching.
//!
//! The supervisor never touches `tokio::process` directly; it goes through
//! [`ProcessLauncher`] and [`ChildHandle`] so its state machine can be driven
//! by an in-memory launcher in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use vigil_common::{ProcessError, ProcessResult};
use vigil_error_log::ServiceOutput;
use vigil_process::{kill_group, terminate_group};

use crate::config::{CommandConfig, ServiceConfig};

/// How the managed service is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartMode {
    /// Live-reload development entry point.
    Normal,
    /// Production build followed by the built entry point.
    DegradedRebuilt,
}

impl fmt::Display for StartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::DegradedRebuilt => f.write_str("degraded-rebuilt"),
        }
    }
}

/// Everything needed to run one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub environment: HashMap<String, String>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_directory: None,
            environment: HashMap::new(),
        }
    }

    pub fn from_command(command: &CommandConfig, service: &ServiceConfig) -> Self {
        Self {
            program: command.executable.clone(),
            args: command.arguments.clone(),
            working_directory: service.working_directory.clone(),
            environment: service.environment.clone(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(&self.environment);
        if let Some(dir) = &self.working_directory {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Exit details of a finished child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    pub at: DateTime<Utc>,
}

impl ExitInfo {
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
            at: Utc::now(),
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => f.write_str("unknown status"),
        }
    }
}

/// A spawned child owned by the supervisor.
#[async_trait]
pub trait ChildHandle: Send + Sync {
    fn pid(&self) -> u32;

    /// Ask the child (and its process group) to exit.
    fn terminate(&mut self) -> ProcessResult<()>;

    /// Force the child (and its process group) to exit.
    fn kill(&mut self) -> ProcessResult<()>;

    /// Wait for exit and reap the child.
    async fn wait(&mut self) -> ProcessResult<ExitInfo>;

    /// Non-blocking exit check.
    fn try_wait(&mut self) -> ProcessResult<Option<ExitInfo>>;
}

/// Runs build commands and spawns long-lived children.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Run a command to completion; a non-zero exit is a build failure.
    async fn build(&self, spec: &LaunchSpec) -> ProcessResult<()>;

    fn spawn(&self, spec: &LaunchSpec) -> ProcessResult<Box<dyn ChildHandle>>;
}

/// Launcher backed by `tokio::process`. Children get their own process group
/// and write stdout/stderr to the service log when one is configured.
#[derive(Debug, Clone, Default)]
pub struct TokioLauncher {
    output: Option<ServiceOutput>,
}

impl TokioLauncher {
    pub fn new(output: Option<ServiceOutput>) -> Self {
        Self { output }
    }

    fn stdio(&self) -> (Stdio, Stdio) {
        match &self.output {
            Some(output) => match output.stdio() {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(
                        "Cannot open service log {}: {}, discarding output",
                        output.path().display(),
                        e
                    );
                    (Stdio::null(), Stdio::null())
                }
            },
            None => (Stdio::null(), Stdio::null()),
        }
    }

    fn mark(&self, note: &str) {
        if let Some(output) = &self.output {
            if let Err(e) = output.mark(note) {
                debug!("Failed to write service log marker: {}", e);
            }
        }
    }
}

#[async_trait]
impl ProcessLauncher for TokioLauncher {
    async fn build(&self, spec: &LaunchSpec) -> ProcessResult<()> {
        info!("Running build: {}", spec);
        self.mark(&format!("build: {}", spec));

        let (stdout, stderr) = self.stdio();
        let status = spec
            .command()
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .await
            .map_err(|e| ProcessError::build_failed(spec.to_string(), e.to_string()))?;

        if status.success() {
            info!("Build complete");
            Ok(())
        } else {
            Err(ProcessError::build_failed(
                spec.to_string(),
                ExitInfo::from_status(status).to_string(),
            ))
        }
    }

    fn spawn(&self, spec: &LaunchSpec) -> ProcessResult<Box<dyn ChildHandle>> {
        self.mark(&format!("start: {}", spec));

        let (stdout, stderr) = self.stdio();
        let mut cmd = spec.command();
        cmd.stdin(Stdio::null()).stdout(stdout).stderr(stderr);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| ProcessError::spawn_failed(spec.to_string(), e.to_string()))?;
        let pid = child
            .id()
            .ok_or_else(|| ProcessError::spawn_failed(spec.to_string(), "child exited before pid was read"))?;

        debug!("Spawned {} (PID: {})", spec, pid);
        Ok(Box::new(TokioChild { child, pid }))
    }
}

struct TokioChild {
    child: Child,
    pid: u32,
}

#[async_trait]
impl ChildHandle for TokioChild {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn terminate(&mut self) -> ProcessResult<()> {
        terminate_group(self.pid)
    }

    fn kill(&mut self) -> ProcessResult<()> {
        kill_group(self.pid)?;
        // Make sure the leader itself is gone even if the group signal missed it.
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(ProcessError::stop_failed(self.pid.to_string(), e.to_string())),
        }
    }

    async fn wait(&mut self) -> ProcessResult<ExitInfo> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ProcessError::stop_failed(self.pid.to_string(), e.to_string()))?;
        Ok(ExitInfo::from_status(status))
    }

    fn try_wait(&mut self) -> ProcessResult<Option<ExitInfo>> {
        self.child
            .try_wait()
            .map(|status| status.map(ExitInfo::from_status))
            .map_err(|e| ProcessError::stop_failed(self.pid.to_string(), e.to_string()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> LaunchSpec {
        LaunchSpec::new("sh").with_args(["-c", script])
    }

    #[tokio::test]
    async fn test_spawn_terminate_wait() {
        let launcher = TokioLauncher::default();
        let mut child = launcher.spawn(&LaunchSpec::new("sleep").with_args(["30"])).unwrap();

        assert!(child.try_wait().unwrap().is_none());
        child.terminate().unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit.signal, Some(nix::sys::signal::Signal::SIGTERM as i32));
    }

    #[tokio::test]
    async fn test_kill_reaches_process_group() {
        let launcher = TokioLauncher::default();
        // The shell traps SIGTERM and its background child inherits the group.
        let mut child = launcher
            .spawn(&sh("trap '' TERM; sleep 30 & wait"))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        child.kill().unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit.signal, Some(nix::sys::signal::Signal::SIGKILL as i32));
    }

    #[tokio::test]
    async fn test_build_reports_exit_status() {
        let launcher = TokioLauncher::default();
        assert!(launcher.build(&sh("exit 0")).await.is_ok());

        let err = launcher.build(&sh("exit 3")).await.unwrap_err();
        assert!(err.is_build_failure());
        assert!(err.to_string().contains("exit code 3"));
    }

    #[tokio::test]
    async fn test_missing_executable_fails_to_spawn() {
        let launcher = TokioLauncher::default();
        let result = launcher.spawn(&LaunchSpec::new("/nonexistent/vigil-test-binary"));
        assert!(matches!(result, Err(ProcessError::SpawnFailed { .. })));
    }

    #[tokio::test]
    async fn test_output_goes_to_service_log() {
        let dir = tempfile::tempdir().unwrap();
        let output = ServiceOutput::new(dir.path().join("server.log"));
        let launcher = TokioLauncher::new(Some(output.clone()));

        let mut child = launcher.spawn(&sh("echo ready; echo oops >&2")).unwrap();
        let exit = child.wait().await.unwrap();
        assert_eq!(exit.code, Some(0));

        let log = std::fs::read_to_string(output.path()).unwrap();
        assert!(log.contains("--- start: sh -c"));
        assert!(log.contains("ready\n"));
        assert!(log.contains("oops\n"));
    }
}
