//! # Vigil Process Management
//!
//! Configuration, launching and supervision of the managed web service,
//! plus the recovery loop that restarts it when health checks fail.

pub mod config;
pub mod launcher;
pub mod lifecycle;
pub mod recovery;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    CommandConfig, HealthConfig, LoggingConfig, RecoveryConfig, ServiceConfig, SupervisorConfig,
    VigilConfig, VigilPaths, DEFAULT_CONFIG_FILE,
};
pub use launcher::{ChildHandle, ExitInfo, LaunchSpec, ProcessLauncher, StartMode, TokioLauncher};
pub use lifecycle::{BudgetDecision, RestartBudget};
pub use recovery::{RecoveryLoop, RunOnceOutcome, TickOutcome};
pub use supervisor::{
    ManagedService, ProcessSupervisor, ServiceCommands, SupervisorSettings, SupervisorState,
};
