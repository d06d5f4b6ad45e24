//! Network interface byte counters.

use sysinfo::Networks;
use tracing::debug;

use crate::config::Selection;

const LOOPBACK: &str = "lo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceUsage {
    pub interface: String,
    pub sent: u64,
    pub received: u64,
}

/// `IFF_UP` in the interface flags word.
#[cfg(target_os = "linux")]
const IFF_UP: u32 = 0x1;

/// Parse `/sys/class/net/<name>/flags` (`0x1003`).
#[cfg(any(target_os = "linux", test))]
fn flags_report_up(flags: &str, up_mask: u32) -> Option<bool> {
    let flags = flags.trim();
    let digits = flags.strip_prefix("0x").unwrap_or(flags);
    u32::from_str_radix(digits, 16)
        .ok()
        .map(|flags| flags & up_mask != 0)
}

/// Whether an interface is administratively up. Interfaces whose state
/// cannot be read count as up.
#[cfg(target_os = "linux")]
fn interface_is_up(name: &str) -> bool {
    std::fs::read_to_string(format!("/sys/class/net/{}/flags", name))
        .ok()
        .and_then(|flags| flags_report_up(&flags, IFF_UP))
        .unwrap_or(true)
}

#[cfg(not(target_os = "linux"))]
fn interface_is_up(_name: &str) -> bool {
    true
}

/// Interfaces to report.
///
/// `true` picks every available interface that is up, except loopback,
/// sorted by name; a list is taken as-is.
pub fn select_interfaces<'a>(
    available: impl IntoIterator<Item = &'a str>,
    selection: &Selection,
    is_up: impl Fn(&str) -> bool,
) -> Vec<String> {
    match selection {
        Selection::Enabled(false) => Vec::new(),
        Selection::Only(names) => names.clone(),
        Selection::Enabled(true) => {
            let mut names: Vec<String> = available
                .into_iter()
                .filter(|name| *name != LOOPBACK && is_up(*name))
                .map(str::to_string)
                .collect();
            names.sort();
            names
        }
    }
}

pub struct NetworkProvider {
    networks: Networks,
    interfaces: Vec<String>,
}

impl NetworkProvider {
    pub fn new(selection: &Selection) -> Self {
        if !selection.is_enabled() {
            return Self {
                networks: Networks::new(),
                interfaces: Vec::new(),
            };
        }

        let networks = Networks::new_with_refreshed_list();
        let interfaces = select_interfaces(
            networks.list().keys().map(String::as_str),
            selection,
            interface_is_up,
        );
        debug!(?interfaces, "Network usage interfaces");
        Self {
            networks,
            interfaces,
        }
    }

    /// Cumulative counters of the selected interfaces that currently exist.
    pub fn sample(&mut self) -> Vec<InterfaceUsage> {
        if self.interfaces.is_empty() {
            return Vec::new();
        }
        self.networks.refresh(true);

        self.interfaces
            .iter()
            .filter(|name| name.as_str() != LOOPBACK)
            .filter_map(|name| {
                let data = self.networks.list().get(name)?;
                Some(InterfaceUsage {
                    interface: name.clone(),
                    sent: data.total_transmitted(),
                    received: data.total_received(),
                })
            })
            .collect()
    }
}
