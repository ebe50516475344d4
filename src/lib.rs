//! # Vigil
//!
//! Self-healing supervisor for the MetaBalance web service.
//!
//! The `server-monitor` daemon keeps the service running and restarts it when
//! health checks fail, `health-check` does the same once (or in a watch loop)
//! without a daemon, and `error-logger` reports on the shared error logs.

pub mod daemon;
pub mod errors;
pub mod health_check;
pub mod logging;
pub mod report;
pub mod runtime;

pub use daemon::DaemonLifecycle;
pub use errors::{Result, VigilError};
pub use vigil_process_management::VigilConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
