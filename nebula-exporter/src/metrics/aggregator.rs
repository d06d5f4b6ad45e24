//! Scrape-time collection and rendering.

use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::disk::DiskProvider;
use super::gpu::{GpuProvider, GpuStats};
use super::host::{HostSample, HostSampler, local_hostname, uptime_seconds};
use super::network::NetworkProvider;
use super::render::MetricRenderer;
use crate::caspar::CasparProvider;
use crate::config::Settings;
use crate::error::Result;

/// Expensive host values are resampled at most this often.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(2);

/// Throttled host values.
struct MetricsSnapshot {
    sampler: HostSampler,
    last_update: Option<Instant>,
    host: HostSample,
    gpus: Vec<GpuStats>,
}

impl MetricsSnapshot {
    fn is_stale(&self, freshness: Duration) -> bool {
        self.last_update
            .is_none_or(|updated| updated.elapsed() > freshness)
    }
}

/// Produces the `/metrics` body.
pub struct MetricsAggregator {
    renderer: MetricRenderer,
    freshness: Duration,
    snapshot: tokio::sync::Mutex<MetricsSnapshot>,
    disks: Mutex<DiskProvider>,
    network: Mutex<NetworkProvider>,
    gpu: GpuProvider,
    caspar: Option<Arc<CasparProvider>>,
}

impl MetricsAggregator {
    pub fn new(settings: &Settings, caspar: Option<Arc<CasparProvider>>) -> Self {
        Self {
            renderer: MetricRenderer::from_settings(settings, &local_hostname()),
            freshness: DEFAULT_FRESHNESS,
            snapshot: tokio::sync::Mutex::new(MetricsSnapshot {
                sampler: HostSampler::new(),
                last_update: None,
                host: HostSample::default(),
                gpus: Vec::new(),
            }),
            disks: Mutex::new(DiskProvider::new(&settings.disk_usage)),
            network: Mutex::new(NetworkProvider::new(&settings.network_usage)),
            gpu: GpuProvider::new(settings.smi_path.as_deref()),
            caspar,
        }
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    /// Host values, resampled first if older than the freshness window.
    async fn host_values(&self) -> (HostSample, Vec<GpuStats>) {
        let mut snapshot = self.snapshot.lock().await;
        if snapshot.is_stale(self.freshness) {
            trace!("Resampling host metrics");
            let host = snapshot.sampler.sample();
            snapshot.host = host;
            snapshot.gpus = self.gpu.sample().await;
            snapshot.last_update = Some(Instant::now());
        }
        (snapshot.host, snapshot.gpus.clone())
    }

    fn write(
        &self,
        out: &mut String,
        name: &str,
        value: impl Display,
        tags: &[(&str, &dyn Display)],
    ) -> Result<()> {
        Ok(self.renderer.write_metric(out, name, value, tags)?)
    }

    /// Render the full exposition text.
    ///
    /// Reading the CasparCG peak levels resets them, so every call consumes
    /// the peaks accumulated since the previous one.
    pub async fn render(&self) -> Result<String> {
        let (host, gpus) = self.host_values().await;
        let mut out = String::with_capacity(4096);

        self.write(&mut out, "uptime_seconds", uptime_seconds(), &[])?;
        self.write(&mut out, "cpu_usage", host.cpu_usage, &[])?;
        self.write(&mut out, "memory_bytes_total", host.memory_total, &[])?;
        self.write(&mut out, "memory_bytes_free", host.memory_available, &[])?;
        self.write(&mut out, "memory_usage", host.memory_usage(), &[])?;
        self.write(&mut out, "disk_read_bytes", host.disk_read_bytes, &[])?;
        self.write(&mut out, "disk_write_bytes", host.disk_written_bytes, &[])?;

        let disks = self.disks.lock().sample();
        for disk in &disks {
            let tags: [(&str, &dyn Display); 2] =
                [("mountpoint", &disk.mountpoint), ("fstype", &disk.fstype)];
            self.write(&mut out, "disk_bytes_total", disk.total, &tags)?;
            self.write(&mut out, "disk_bytes_free", disk.free, &tags)?;
            self.write(&mut out, "disk_usage", disk.usage, &tags)?;
        }

        let interfaces = self.network.lock().sample();
        for interface in &interfaces {
            let tags: [(&str, &dyn Display); 1] = [("interface", &interface.interface)];
            self.write(&mut out, "network_sent_bytes_total", interface.sent, &tags)?;
            self.write(&mut out, "network_recv_bytes_total", interface.received, &tags)?;
        }

        for (gpu_id, gpu) in gpus.iter().enumerate() {
            for (key, value) in &gpu.utilization {
                let key = if key == "gpu" { "usage" } else { key.as_str() };
                let tags: [(&str, &dyn Display); 1] = [("gpu_id", &gpu_id)];
                self.write(&mut out, &format!("gpu_{}", key), value, &tags)?;
            }
        }

        if let Some(caspar) = &self.caspar {
            self.write_caspar(&mut out, caspar)?;
        }

        debug!(bytes = out.len(), "Rendered metrics");
        Ok(out)
    }

    fn write_caspar(&self, out: &mut String, caspar: &CasparProvider) -> Result<()> {
        let host = caspar.host();
        let version = caspar.protocol();

        let tags: [(&str, &dyn Display); 2] =
            [("casparcg_host", &host), ("casparcg_version", &version)];
        self.write(out, "casparcg_idle_seconds", caspar.idle_seconds(), &tags)?;

        for &channel in caspar.channels().keys() {
            let peak = caspar.take_peak_volume(channel);
            let tags: [(&str, &dyn Display); 3] = [
                ("casparcg_host", &host),
                ("casparcg_version", &version),
                ("channel", &channel),
            ];
            self.write(out, "casparcg_peak_volume", peak, &tags)?;

            for (layer, dropped) in caspar.dropped_frames(channel) {
                let tags: [(&str, &dyn Display); 4] = [
                    ("casparcg_host", &host),
                    ("casparcg_version", &version),
                    ("channel", &channel),
                    ("layer", &layer),
                ];
                self.write(out, "casparcg_dropped_total", dropped, &tags)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Selection;

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.hostname = Some("host1".into());
        settings.tags.insert("env".into(), "prod".into());
        settings.disk_usage = Selection::Enabled(false);
        settings.network_usage = Selection::Enabled(false);
        settings
    }

    fn metric_names(text: &str) -> Vec<&str> {
        text.lines()
            .filter_map(|line| line.split('{').next())
            .collect()
    }

    #[tokio::test]
    async fn test_host_metrics_order() {
        let aggregator = MetricsAggregator::new(&settings(), None);
        let text = aggregator.render().await.unwrap();

        let names = metric_names(&text);
        assert_eq!(
            &names[..7],
            &[
                "nebula_uptime_seconds",
                "nebula_cpu_usage",
                "nebula_memory_bytes_total",
                "nebula_memory_bytes_free",
                "nebula_memory_usage",
                "nebula_disk_read_bytes",
                "nebula_disk_write_bytes",
            ]
        );
        assert!(!text.contains("casparcg_"));
        for line in text.lines() {
            assert!(line.contains("hostname=\"host1\""), "{}", line);
            assert!(line.contains(", env=\"prod\"}"), "{}", line);
        }
    }

    #[tokio::test]
    async fn test_snapshot_is_reused_within_window() {
        let aggregator = MetricsAggregator::new(&settings(), None);
        aggregator.render().await.unwrap();
        let first = aggregator.snapshot.lock().await.last_update;
        aggregator.render().await.unwrap();
        let second = aggregator.snapshot.lock().await.last_update;
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_snapshot_expires() {
        let aggregator =
            MetricsAggregator::new(&settings(), None).with_freshness(Duration::from_millis(10));
        aggregator.render().await.unwrap();
        let first = aggregator.snapshot.lock().await.last_update;
        tokio::time::sleep(Duration::from_millis(30)).await;
        aggregator.render().await.unwrap();
        let second = aggregator.snapshot.lock().await.last_update;
        assert!(second > first);
    }
}
