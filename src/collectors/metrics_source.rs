use crate::error::CollectorError;
use crate::events::MetricSample;
use chrono::Utc;
use log::debug;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};

/// Source of host resource measurements
///
/// Components that need host metrics take one of these instead of reading
/// platform globals, so tests can substitute fixed readings.
#[cfg_attr(test, mockall::automock)]
pub trait MetricsSource: Send + Sync {
    /// Take a fresh sample at call time
    fn sample(&self) -> MetricSample;
}

/// Host metrics read through `sysinfo`
///
/// CPU usage is the average since the previous refresh; the first refresh
/// happens at construction. Readings the platform does not provide are 0.
pub struct SystemMetricsSource {
    state: Mutex<SystemState>,
}

struct SystemState {
    system: System,
    last_cpu_refresh: Instant,
}

impl Default for SystemMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMetricsSource {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();

        Self {
            state: Mutex::new(SystemState {
                system,
                last_cpu_refresh: Instant::now(),
            }),
        }
    }

    fn cpu_percent(state: &mut SystemState) -> f64 {
        // sysinfo needs two refreshes at least this far apart for a usable delta
        let elapsed = state.last_cpu_refresh.elapsed();
        if elapsed < MINIMUM_CPU_UPDATE_INTERVAL {
            std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL - elapsed);
        }

        state.system.refresh_cpu();
        state.last_cpu_refresh = Instant::now();
        f64::from(state.system.global_cpu_info().cpu_usage())
    }

    fn memory_percent(system: &mut System) -> f64 {
        system.refresh_memory();
        percentage(system.used_memory(), system.total_memory())
    }

    fn disk_percent() -> f64 {
        let disks = Disks::new_with_refreshed_list();
        let spaces: Vec<DiskSpace<'_>> = disks
            .list()
            .iter()
            .map(|disk| DiskSpace {
                mount_point: disk.mount_point(),
                total: disk.total_space(),
                available: disk.available_space(),
            })
            .collect();

        if spaces.is_empty() {
            debug!("No disks reported by the platform");
        }
        disk_usage_percent(&spaces)
    }
}

/// Capacity of one mounted disk, in bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskSpace<'a> {
    pub mount_point: &'a Path,
    pub total: u64,
    pub available: u64,
}

/// Used space of the root filesystem as a percentage
///
/// Falls back to the sum over all disks when nothing is mounted at `/`,
/// and to 0 when there are no disks.
pub fn disk_usage_percent(disks: &[DiskSpace<'_>]) -> f64 {
    let (total, available) = match disks
        .iter()
        .find(|disk| disk.mount_point == Path::new("/"))
    {
        Some(root) => (root.total, root.available),
        None => disks.iter().fold((0u64, 0u64), |(total, available), disk| {
            (
                total.saturating_add(disk.total),
                available.saturating_add(disk.available),
            )
        }),
    };

    percentage(total.saturating_sub(available), total)
}

/// Take a sample on the blocking thread pool
///
/// Sampling may sleep until CPU usage can be measured, so it must not run
/// on an async worker thread.
pub async fn sample_blocking(
    source: &Arc<dyn MetricsSource>,
) -> Result<MetricSample, CollectorError> {
    let source = Arc::clone(source);
    tokio::task::spawn_blocking(move || source.sample())
        .await
        .map_err(|e| CollectorError::SamplingFailed(e.to_string()))
}

impl MetricsSource for SystemMetricsSource {
    fn sample(&self) -> MetricSample {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let cpu_percent = Self::cpu_percent(&mut state);
        let memory_percent = Self::memory_percent(&mut state.system);

        MetricSample {
            timestamp: Utc::now(),
            cpu_percent,
            memory_percent,
            disk_percent: Self::disk_percent(),
            load_average: System::load_average().one,
        }
    }
}

/// `part` as a percentage of `total`, 0 when `total` is 0
fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
