//! Host CPU, memory and disk I/O sampling.

use std::collections::HashSet;

use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};

/// One resample of the throttled host values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostSample {
    /// Global CPU usage in percent
    pub cpu_usage: f32,
    pub memory_total: u64,
    pub memory_available: u64,
    /// Cumulative bytes read from all block devices
    pub disk_read_bytes: u64,
    /// Cumulative bytes written to all block devices
    pub disk_written_bytes: u64,
}

impl HostSample {
    /// Used memory in percent of total.
    pub fn memory_usage(&self) -> f64 {
        if self.memory_total == 0 {
            return 0.0;
        }
        let used = self.memory_total.saturating_sub(self.memory_available);
        used as f64 / self.memory_total as f64 * 100.0
    }
}

/// Wraps the `sysinfo` handles that must persist between samples (CPU usage
/// is computed from the delta of two refreshes).
pub struct HostSampler {
    system: System,
    disks: Disks,
}

impl HostSampler {
    pub fn new() -> Self {
        Self {
            system: System::new_with_specifics(
                RefreshKind::nothing()
                    .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
                    .with_memory(MemoryRefreshKind::nothing().with_ram()),
            ),
            disks: Disks::new_with_refreshed_list(),
        }
    }

    pub fn sample(&mut self) -> HostSample {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        self.disks.refresh(true);

        // A device mounted more than once must only be counted once.
        let mut seen = HashSet::new();
        let (disk_read_bytes, disk_written_bytes) = self
            .disks
            .list()
            .iter()
            .filter(|disk| seen.insert(disk.name().to_os_string()))
            .map(|disk| disk.usage())
            .fold((0u64, 0u64), |(read, written), usage| {
                (
                    read.saturating_add(usage.total_read_bytes),
                    written.saturating_add(usage.total_written_bytes),
                )
            });

        HostSample {
            cpu_usage: self.system.global_cpu_usage(),
            memory_total: self.system.total_memory(),
            memory_available: self.system.available_memory(),
            disk_read_bytes,
            disk_written_bytes,
        }
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Seconds since the machine booted.
pub fn uptime_seconds() -> u64 {
    System::uptime()
}

/// Local host name, `localhost` if it cannot be determined.
pub fn local_hostname() -> String {
    System::host_name()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
