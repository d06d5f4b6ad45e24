//! Disk usage per mountpoint.

use std::path::PathBuf;

use sysinfo::Disks;
use tracing::debug;

use crate::config::Selection;

/// Pseudo and system mounts that are never reported.
const MOUNTPOINT_BLACKLIST: &[&str] = &[
    "/run", "/proc", "/sys", "/dev", "/snap", "/var/lib", "/tmp/snap",
];

#[derive(Debug, Clone, PartialEq)]
pub struct DiskUsage {
    /// Mountpoint with `\` normalized to `/`
    pub mountpoint: String,
    pub fstype: String,
    pub total: u64,
    pub free: u64,
    /// Used space in percent of total
    pub usage: f64,
}

/// Whether a mountpoint passes the blacklist and the optional allow-list.
///
/// An allow-list entry of `/` only matches the root mount; other entries are
/// case-insensitive prefixes.
pub fn is_selected(mountpoint: &str, allow_list: Option<&[String]>) -> bool {
    if MOUNTPOINT_BLACKLIST
        .iter()
        .any(|blocked| mountpoint.starts_with(blocked))
    {
        return false;
    }

    let Some(allow_list) = allow_list.filter(|list| !list.is_empty()) else {
        return true;
    };

    let lowered = mountpoint.to_lowercase();
    allow_list.iter().any(|entry| {
        if entry == "/" {
            mountpoint == "/"
        } else {
            lowered.starts_with(&entry.to_lowercase())
        }
    })
}

pub fn usage_percent(total: u64, available: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    total.saturating_sub(available) as f64 / total as f64 * 100.0
}

/// Reports the mountpoints selected at construction.
pub struct DiskProvider {
    disks: Disks,
    mountpoints: Vec<PathBuf>,
}

impl DiskProvider {
    pub fn new(selection: &Selection) -> Self {
        if !selection.is_enabled() {
            return Self {
                disks: Disks::new(),
                mountpoints: Vec::new(),
            };
        }

        let disks = Disks::new_with_refreshed_list();
        let mountpoints: Vec<PathBuf> = disks
            .list()
            .iter()
            .map(|disk| disk.mount_point().to_path_buf())
            .filter(|path| is_selected(&path.to_string_lossy(), selection.allow_list()))
            .collect();
        debug!(?mountpoints, "Disk usage mountpoints");

        Self { disks, mountpoints }
    }

    pub fn is_empty(&self) -> bool {
        self.mountpoints.is_empty()
    }

    /// Current usage of every selected mountpoint that is still mounted.
    pub fn sample(&mut self) -> Vec<DiskUsage> {
        if self.mountpoints.is_empty() {
            return Vec::new();
        }
        self.disks.refresh(true);

        self.mountpoints
            .iter()
            .filter_map(|mountpoint| {
                let disk = self
                    .disks
                    .list()
                    .iter()
                    .find(|disk| disk.mount_point() == mountpoint)?;
                let total = disk.total_space();
                let free = disk.available_space();
                Some(DiskUsage {
                    mountpoint: mountpoint.to_string_lossy().replace('\\', "/"),
                    fstype: disk.file_system().to_string_lossy().into_owned(),
                    total,
                    free,
                    usage: usage_percent(total, free),
                })
            })
            .collect()
    }
}
