//! Host health snapshot for the `/health` endpoint.

use serde::Serialize;
use std::path::Path;
use sysinfo::{Disks, System};

use crate::{Error, Result};

/// CPU or memory usage at or above this percentage flags the host.
pub const WARNING_THRESHOLD: f64 = 80.0;

/// Overall host status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "WARNING")]
    Warning,
}

/// Raw usage percentages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

/// `/health` response payload.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub cpu: String,
    pub memory: String,
    pub disk: String,
}

impl HostSnapshot {
    /// Samples CPU, memory and root filesystem usage.
    ///
    /// CPU usage needs two refreshes separated by the sampling interval, so
    /// this runs on the blocking pool.
    pub async fn capture() -> Result<Self> {
        tokio::task::spawn_blocking(Self::capture_blocking)
            .await
            .map_err(|e| Error::Io(format!("Health sampling task failed: {}", e)))
    }

    fn capture_blocking() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_cpu();
        system.refresh_memory();

        let cpu_percent = f64::from(system.global_cpu_info().cpu_usage());
        let memory_percent = percent(system.used_memory(), system.total_memory());

        let disks = Disks::new_with_refreshed_list();
        let root = root_mount();
        let disk_percent = disks
            .list()
            .iter()
            .find(|disk| disk.mount_point() == root)
            .map(|disk| {
                percent(
                    disk.total_space().saturating_sub(disk.available_space()),
                    disk.total_space(),
                )
            })
            .unwrap_or(0.0);

        Self {
            cpu_percent,
            memory_percent,
            disk_percent,
        }
    }

    pub fn status(&self) -> HealthStatus {
        if self.cpu_percent < WARNING_THRESHOLD && self.memory_percent < WARNING_THRESHOLD {
            HealthStatus::Ok
        } else {
            HealthStatus::Warning
        }
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            status: self.status(),
            cpu: format!("{:.1}%", self.cpu_percent),
            memory: format!("{:.1}%", self.memory_percent),
            disk: format!("{:.1}%", self.disk_percent),
        }
    }
}

fn root_mount() -> &'static Path {
    if cfg!(windows) {
        Path::new("C:\\")
    } else {
        Path::new("/")
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    used as f64 / total as f64 * 100.0
}
