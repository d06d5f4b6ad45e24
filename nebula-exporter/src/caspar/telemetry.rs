//! Frame-drop counters, peak audio levels and other values derived from the
//! OSC stream.
//!
//! The OSC listener is the only writer. Scrapes read concurrently; the peak
//! level read is destructive.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use super::protocol::FrameRate;
use super::stage::StageStateTree;

/// Per-channel maximum of a level since the last read.
///
/// Levels are stored as `f64` bits so that recording and the read-reset swap
/// are single atomic operations.
#[derive(Debug, Default)]
pub struct PeakTracker {
    channels: DashMap<u32, AtomicU64>,
}

impl PeakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the channel's peak to `value` if it is higher.
    pub fn record(&self, channel: u32, value: f64) {
        if value.is_nan() {
            return;
        }
        let slot = self
            .channels
            .entry(channel)
            .or_insert_with(|| AtomicU64::new(0f64.to_bits()));

        let mut current = slot.load(Ordering::Acquire);
        while value > f64::from_bits(current) {
            match slot.compare_exchange_weak(
                current,
                value.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    /// Current peak without resetting it.
    pub fn peek(&self, channel: u32) -> f64 {
        self.channels
            .get(&channel)
            .map(|slot| f64::from_bits(slot.load(Ordering::Acquire)))
            .unwrap_or(0.0)
    }

    /// Return the peak since the previous call and reset it to zero.
    pub fn take(&self, channel: u32) -> f64 {
        self.channels
            .get(&channel)
            .map(|slot| f64::from_bits(slot.swap(0f64.to_bits(), Ordering::AcqRel)))
            .unwrap_or(0.0)
    }
}

/// Monotonic per-(channel, layer) dropped frame counters.
#[derive(Debug, Default)]
pub struct DropCounters {
    counters: DashMap<(u32, u32), AtomicU64>,
}

impl DropCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one dropped frame and return the new total.
    pub fn increment(&self, channel: u32, layer: u32) -> u64 {
        self.counters
            .entry((channel, layer))
            .or_default()
            .fetch_add(1, Ordering::Relaxed)
            + 1
    }

    pub fn get(&self, channel: u32, layer: u32) -> u64 {
        self.counters
            .get(&(channel, layer))
            .map(|count| count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// (layer, count) pairs of a channel, by ascending layer id.
    pub fn layers_of(&self, channel: u32) -> Vec<(u32, u64)> {
        let mut layers: Vec<(u32, u64)> = self
            .counters
            .iter()
            .filter(|entry| entry.key().0 == channel)
            .map(|entry| (entry.key().1, entry.value().load(Ordering::Relaxed)))
            .collect();
        layers.sort_unstable_by_key(|(layer, _)| *layer);
        layers
    }
}

/// Everything the OSC stream feeds, plus the discovered frame rates it is
/// interpreted against.
#[derive(Debug)]
pub struct Telemetry {
    /// Discovered at startup, never changed afterwards
    frame_rates: BTreeMap<u32, FrameRate>,
    pub stage: StageStateTree,
    pub drops: DropCounters,
    pub peaks: PeakTracker,
    /// Last `(num, den)` each channel reported over OSC
    reported_frame_rates: DashMap<u32, (f64, f64)>,
    started: Instant,
    /// Offset of the last received datagram from `started`
    last_message: Mutex<Option<Duration>>,
}

impl Telemetry {
    pub fn new(frame_rates: BTreeMap<u32, FrameRate>) -> Self {
        Self {
            frame_rates,
            stage: StageStateTree::new(),
            drops: DropCounters::new(),
            peaks: PeakTracker::new(),
            reported_frame_rates: DashMap::new(),
            started: Instant::now(),
            last_message: Mutex::new(None),
        }
    }

    /// Frame rate of a channel, 25/1 when unknown.
    pub fn frame_rate(&self, channel: u32) -> FrameRate {
        self.frame_rates
            .get(&channel)
            .copied()
            .unwrap_or(FrameRate::DEFAULT)
    }

    /// Store an OSC frame-rate report. Returns `true` if it differs from the
    /// previous report for the channel.
    pub fn report_frame_rate(&self, channel: u32, rate: (f64, f64)) -> bool {
        match self.reported_frame_rates.insert(channel, rate) {
            Some(previous) => previous != rate,
            None => true,
        }
    }

    pub fn reported_frame_rate(&self, channel: u32) -> Option<(f64, f64)> {
        self.reported_frame_rates.get(&channel).map(|rate| *rate)
    }

    /// Mark that a datagram just arrived.
    pub fn touch(&self) {
        *self.last_message.lock() = Some(self.started.elapsed());
    }

    /// Seconds since the last datagram, or since startup if none arrived yet.
    pub fn idle_seconds(&self) -> f64 {
        let since = (*self.last_message.lock()).unwrap_or(Duration::ZERO);
        self.started.elapsed().saturating_sub(since).as_secs_f64()
    }
}
