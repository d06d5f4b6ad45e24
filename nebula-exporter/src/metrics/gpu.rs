//! NVIDIA GPU utilisation through `nvidia-smi`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

/// Standard install locations, checked after the configured path.
const SMI_CANDIDATES: &[&str] = &[
    "c:\\Program Files\\NVIDIA Corporation\\NVSMI\\nvidia-smi.exe",
    "/usr/bin/nvidia-smi",
    "/usr/local/bin/nvidia-smi",
];

const SMI_TIMEOUT: Duration = Duration::from_secs(5);

/// Report sections, matched against 4-space indented headers.
const SECTIONS: &[(&str, Section)] = &[
    ("Utilization", Section::Utilization),
    ("GPU Utilization Samples", Section::Samples),
    ("Memory Utilization Samples", Section::Samples),
    ("ENC Utilization Samples", Section::Samples),
    ("DEC Utilization Samples", Section::Samples),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Utilization,
    Samples,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuStats {
    /// Bus id from the `GPU ...` header line
    pub id: String,
    /// Lower-cased utilisation keys (`gpu`, `memory`, `encoder`, ...) in
    /// percent
    pub utilization: IndexMap<String, f64>,
}

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// A `tokio::process::Command` that does not flash a console window on
/// Windows.
fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    #[allow(unused_mut)]
    let mut cmd = tokio::process::Command::new(program);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        cmd.as_std_mut().creation_flags(CREATE_NO_WINDOW);
    }
    cmd
}

/// Leading number of a `value unit` string; anything unparsable is 0.
fn leading_number(value: &str) -> f64 {
    value
        .split_whitespace()
        .next()
        .and_then(|number| number.parse().ok())
        .unwrap_or(0.0)
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Parse the text of `nvidia-smi -q -d utilization`.
pub fn parse_smi_output(output: &str) -> Vec<GpuStats> {
    let mut gpus: Vec<GpuStats> = Vec::new();
    let mut section = None;

    for line in output.lines() {
        let line = line.trim_end_matches('\r');

        if let Some(id) = line.strip_prefix("GPU ") {
            gpus.push(GpuStats {
                id: id.trim().to_string(),
                utilization: IndexMap::new(),
            });
            section = None;
            continue;
        }

        let indent = indent_of(line);
        if indent == 4 {
            let header = line.trim();
            section = SECTIONS
                .iter()
                .find(|(name, _)| header.starts_with(name))
                .map(|(_, section)| *section);
            continue;
        }

        if indent >= 8
            && section == Some(Section::Utilization)
            && let Some(gpu) = gpus.last_mut()
            && let Some((key, value)) = line.trim().split_once(':')
        {
            let key = key.trim().to_lowercase().replace(' ', "_");
            gpu.utilization.insert(key, leading_number(value.trim()));
        }
    }

    gpus
}

/// Locate `nvidia-smi`, preferring the configured path.
pub fn find_smi(configured: Option<&Path>) -> Option<PathBuf> {
    configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SMI_CANDIDATES.iter().map(PathBuf::from))
        .find(|path| path.is_file())
}

pub struct GpuProvider {
    smi_path: Option<PathBuf>,
}

impl GpuProvider {
    pub fn new(configured: Option<&Path>) -> Self {
        let smi_path = find_smi(configured);
        match &smi_path {
            Some(path) => info!(path = %path.display(), "nvidia-smi found, GPU metrics enabled"),
            None => debug!("nvidia-smi not found, GPU metrics disabled"),
        }
        Self { smi_path }
    }

    pub fn is_available(&self) -> bool {
        self.smi_path.is_some()
    }

    /// Query current utilisation. Any failure yields an empty table.
    pub async fn sample(&self) -> Vec<GpuStats> {
        let Some(path) = &self.smi_path else {
            return Vec::new();
        };

        let mut command = tokio_command(path);
        command
            .args(["-q", "-d", "utilization"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(SMI_TIMEOUT, command.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                parse_smi_output(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(Ok(output)) => {
                warn!(status = %output.status, "nvidia-smi exited with an error");
                Vec::new()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to run nvidia-smi");
                Vec::new()
            }
            Err(_) => {
                warn!("nvidia-smi timed out");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "
==============NVSMI LOG==============

Timestamp                                 : Thu Oct 15 10:12:01 2026
Driver Version                            : 535.129.03
CUDA Version                              : 12.2

Attached GPUs                             : 2
GPU 00000000:01:00.0
    Utilization
        Gpu                               : 17 %
        Memory                            : 4 %
        Encoder                           : 0 %
        Decoder                           : 12 %
        JPEG                              : N/A
    GPU Utilization Samples
        Duration                          : 16.62 sec
        Number of Samples                 : 99
        Max                               : 29 %
    ENC Utilization Samples
        Duration                          : 16.62 sec
        Max                               : 0 %

GPU 00000000:02:00.0
    Utilization
        Gpu                               : 3 %
        Memory                            : 1 %
        Encoder                           : 0 %
        Decoder                           : 0 %
";

    #[test]
    fn test_parse_two_gpus() {
        let gpus = parse_smi_output(REPORT);
        assert_eq!(gpus.len(), 2);

        assert_eq!(gpus[0].id, "00000000:01:00.0");
        let keys: Vec<&str> = gpus[0].utilization.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["gpu", "memory", "encoder", "decoder", "jpeg"]);
        assert_eq!(gpus[0].utilization["gpu"], 17.0);
        assert_eq!(gpus[0].utilization["decoder"], 12.0);
        assert_eq!(gpus[0].utilization["jpeg"], 0.0);
        assert!(!gpus[0].utilization.contains_key("max"));

        assert_eq!(gpus[1].utilization["gpu"], 3.0);
    }

    #[test]
    fn test_windows_line_endings() {
        let report = "GPU 00000000:01:00.0\r\n    Utilization\r\n        Gpu : 42 %\r\n";
        let gpus = parse_smi_output(report);
        assert_eq!(gpus[0].utilization["gpu"], 42.0);
    }

    #[test]
    fn test_empty_output() {
        assert!(parse_smi_output("").is_empty());
        assert!(parse_smi_output("No devices were found\n").is_empty());
    }

    #[test]
    fn test_configured_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let configured = dir.path().join("nvidia-smi");
        assert_ne!(find_smi(Some(&configured)).as_deref(), Some(configured.as_path()));

        std::fs::write(&configured, b"").unwrap();
        assert_eq!(find_smi(Some(&configured)), Some(configured.clone()));
    }

    #[tokio::test]
    async fn test_unavailable_provider_samples_nothing() {
        let provider = GpuProvider { smi_path: None };
        assert!(provider.sample().await.is_empty());
    }
}
