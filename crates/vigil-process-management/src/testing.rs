//! In-memory launcher and probe for driving the supervisor in tests.

use crate::launcher::{ChildHandle, ExitInfo, LaunchSpec, ProcessLauncher};
use crate::supervisor::ServiceCommands;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vigil_common::{ProcessError, ProcessResult};
use vigil_error_log::{AlertChannels, ErrorLogConfig, ErrorLogger};
use vigil_monitoring::{HealthProbe, HealthStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Build,
    Spawn { pid: u32, program: String },
    Terminate(u32),
    Kill(u32),
    Exit(u32),
}

/// How the next spawned child behaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnBehavior {
    pub ignore_term: bool,
    pub exit_during_settle: bool,
    pub fail_spawn: bool,
}

#[derive(Debug, Default)]
struct FakeChildState {
    exited: Option<ExitInfo>,
    ignore_term: bool,
    terminated: bool,
    killed: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    next_pid: u32,
    events: Vec<Event>,
    children: HashMap<u32, FakeChildState>,
    script: VecDeque<SpawnBehavior>,
    fail_builds: bool,
}

#[derive(Debug, Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<FakeState>>,
}

fn exit_with(code: Option<i32>, signal: Option<i32>) -> ExitInfo {
    ExitInfo {
        code,
        signal,
        at: Utc::now(),
    }
}

impl FakeLauncher {
    /// Commands whose program names identify the mode: `dev`, `build`,
    /// `production`.
    pub fn commands() -> ServiceCommands {
        ServiceCommands {
            dev: LaunchSpec::new("dev"),
            build: LaunchSpec::new("build"),
            production: LaunchSpec::new("production"),
        }
    }

    /// Queue behaviour for upcoming spawns, in order.
    pub fn script(&self, behavior: SpawnBehavior) {
        self.state.lock().unwrap().script.push_back(behavior);
    }

    pub fn fail_builds(&self, fail: bool) {
        self.state.lock().unwrap().fail_builds = fail;
    }

    /// Make a running child exit on its own.
    pub fn crash(&self, pid: u32, code: i32) {
        let mut state = self.state.lock().unwrap();
        if let Some(child) = state.children.get_mut(&pid) {
            child.exited = Some(exit_with(Some(code), None));
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| predicate(e))
            .count()
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn build(&self, spec: &LaunchSpec) -> ProcessResult<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Build);
        if state.fail_builds {
            Err(ProcessError::build_failed(spec.to_string(), "exit code 1"))
        } else {
            Ok(())
        }
    }

    fn spawn(&self, spec: &LaunchSpec) -> ProcessResult<Box<dyn ChildHandle>> {
        let mut state = self.state.lock().unwrap();
        let behavior = state.script.pop_front().unwrap_or_default();
        if behavior.fail_spawn {
            return Err(ProcessError::spawn_failed(spec.to_string(), "scripted failure"));
        }

        state.next_pid += 1;
        let pid = 1000 + state.next_pid;
        state.events.push(Event::Spawn {
            pid,
            program: spec.program.clone(),
        });
        state.children.insert(
            pid,
            FakeChildState {
                exited: behavior
                    .exit_during_settle
                    .then(|| exit_with(Some(1), None)),
                ignore_term: behavior.ignore_term,
                ..FakeChildState::default()
            },
        );

        Ok(Box::new(FakeChild {
            pid,
            state: self.state.clone(),
        }))
    }
}

struct FakeChild {
    pid: u32,
    state: Arc<Mutex<FakeState>>,
}

impl FakeChild {
    fn finished(&self) -> Option<ExitInfo> {
        let mut state = self.state.lock().unwrap();
        let child = state.children.get_mut(&self.pid)?;
        if child.exited.is_none() {
            if child.killed {
                child.exited = Some(exit_with(None, Some(9)));
            } else if child.terminated && !child.ignore_term {
                child.exited = Some(exit_with(None, Some(15)));
            }
        }
        child.exited
    }
}

#[async_trait]
impl ChildHandle for FakeChild {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn terminate(&mut self) -> ProcessResult<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Terminate(self.pid));
        if let Some(child) = state.children.get_mut(&self.pid) {
            child.terminated = true;
        }
        Ok(())
    }

    fn kill(&mut self) -> ProcessResult<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Kill(self.pid));
        if let Some(child) = state.children.get_mut(&self.pid) {
            child.killed = true;
        }
        Ok(())
    }

    async fn wait(&mut self) -> ProcessResult<ExitInfo> {
        match self.finished() {
            Some(exit) => {
                self.state.lock().unwrap().events.push(Event::Exit(self.pid));
                Ok(exit)
            }
            None => std::future::pending().await,
        }
    }

    fn try_wait(&mut self) -> ProcessResult<Option<ExitInfo>> {
        Ok(self.finished())
    }
}

/// Probe returning queued statuses, then `fallback` forever.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<HealthStatus>>,
    fallback: HealthStatus,
    headroom: AtomicBool,
    checks: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(fallback: HealthStatus) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            headroom: AtomicBool::new(true),
            checks: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, status: HealthStatus) -> &Self {
        self.script.lock().unwrap().push_back(status);
        self
    }

    pub fn set_headroom(&self, headroom: bool) {
        self.headroom.store(headroom, Ordering::SeqCst);
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn check(&self) -> HealthStatus {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    async fn check_resource_headroom(&self) -> bool {
        self.headroom.load(Ordering::SeqCst)
    }
}

/// Error logger writing into `dir` with console output off.
pub fn test_logger(dir: &Path) -> Arc<ErrorLogger> {
    let config = ErrorLogConfig {
        alerts: AlertChannels {
            console: false,
            file: true,
            webhook_url: None,
        },
        ..ErrorLogConfig::default()
    };
    Arc::new(ErrorLogger::from_config(&config, dir).with_console_echo(false))
}
