//! Logging setup.
//!
//! Console output always; an optional daily-rotated log file when a log
//! directory is given. Timestamps use the local timezone.

use std::path::Path;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "nebula_exporter=info,amcp=info,osc=info,tower_http=warn";

/// Log file name prefix inside the log directory.
const LOG_FILE_NAME: &str = "nebula-exporter.log";

/// Formats timestamps in the server's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Resolve the filter: `RUST_LOG` wins, then the explicit directive, then the
/// default.
fn build_filter(directive: Option<&str>) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    match directive {
        Some(directive) => EnvFilter::try_new(directive)
            .map_err(|e| Error::config(format!("Invalid log filter {:?}: {}", directive, e))),
        None => Ok(EnvFilter::new(DEFAULT_LOG_FILTER)),
    }
}

/// Initialize the global subscriber.
///
/// The returned guard must be held for the lifetime of the process when a
/// log directory is used, otherwise buffered file output is lost.
pub fn init_logging(directive: Option<&str>, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(directive)?;
    let console = fmt::layer().with_ansi(true).with_timer(LocalTimer);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTimer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn test_local_timer_format() {
        let mut out = String::new();
        LocalTimer.format_time(&mut Writer::new(&mut out)).unwrap();
        // 2026-10-16T09:41:07.123+02:00
        assert_eq!(out.len(), 29);
        assert_eq!(&out[10..11], "T");
    }
}
