//! Service health prober.

use crate::http::HttpProbe;
use crate::{HealthCheckResult, HealthStatus, UnhealthyReason};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use vigil_process::is_running_by_signature;
use vigil_resource_limits::FileWatchProbe;

/// Health checks used by the recovery loop.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe liveness: process presence first, then the HTTP endpoint.
    async fn check(&self) -> HealthStatus;

    /// False when the host is low on file-watch capacity.
    async fn check_resource_headroom(&self) -> bool;
}

/// Probes the real process table, HTTP endpoint and procfs.
#[derive(Debug, Clone)]
pub struct HealthProber {
    signature: String,
    http: HttpProbe,
    file_watch: FileWatchProbe,
    file_watch_threshold: u64,
}

impl HealthProber {
    pub fn new(
        signature: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
        file_watch_threshold: u64,
    ) -> HealthCheckResult<Self> {
        Ok(Self {
            signature: signature.into(),
            http: HttpProbe::new(url, timeout)?,
            file_watch: FileWatchProbe::default(),
            file_watch_threshold,
        })
    }

    pub fn with_file_watch_probe(mut self, probe: FileWatchProbe) -> Self {
        self.file_watch = probe;
        self
    }

    async fn process_present(&self) -> bool {
        let signature = self.signature.clone();
        match tokio::task::spawn_blocking(move || is_running_by_signature(&signature)).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Process scan task failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl HealthProbe for HealthProber {
    async fn check(&self) -> HealthStatus {
        if !self.process_present().await {
            debug!("No process matches signature {:?}", self.signature);
            return HealthStatus::unhealthy(UnhealthyReason::ProcessNotRunning);
        }

        match self.http.check().await {
            Ok(_) => HealthStatus::healthy(),
            Err(e) => {
                debug!("HTTP probe failed: {}", e);
                HealthStatus::unhealthy(UnhealthyReason::NotResponding)
            }
        }
    }

    async fn check_resource_headroom(&self) -> bool {
        let probe = self.file_watch.clone();
        let threshold = self.file_watch_threshold;
        match tokio::task::spawn_blocking(move || probe.has_headroom(threshold)).await {
            Ok(headroom) => headroom,
            Err(e) => {
                warn!("File watcher scan task failed: {}", e);
                true
            }
        }
    }
}
