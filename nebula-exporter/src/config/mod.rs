//! Exporter settings.
//!
//! Settings are read once at startup from a JSON file, merged over built-in
//! defaults, then selectively overridden from `NEBULA_*` environment
//! variables. The resulting [`Settings`] value is passed by reference into
//! every component constructor.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Default AMCP control port of a CasparCG server.
pub const DEFAULT_AMCP_PORT: u16 = 5250;
/// Default UDP port the exporter listens on for OSC.
pub const DEFAULT_OSC_PORT: u16 = 6250;
/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 9731;
/// Default metric name prefix.
pub const DEFAULT_PREFIX: &str = "nebula";

/// A feature that is either switched on/off wholesale or restricted to an
/// explicit list of names (mountpoints, interfaces).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    Enabled(bool),
    Only(Vec<String>),
}

impl Selection {
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Enabled(enabled) => *enabled,
            Self::Only(_) => true,
        }
    }

    /// Explicit allow-list, if one was configured.
    pub fn allow_list(&self) -> Option<&[String]> {
        match self {
            Self::Only(names) => Some(names),
            Self::Enabled(_) => None,
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

/// Exporter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// CasparCG server address; empty or absent disables the CasparCG subsystem
    pub caspar_host: Option<String>,
    /// CasparCG AMCP port
    pub amcp_port: u16,
    /// Local UDP port for the OSC stream
    pub osc_port: u16,
    /// Metric name prefix; empty or absent means no prefix
    pub prefix: Option<String>,
    /// HTTP bind address; empty binds all interfaces
    pub host: String,
    /// HTTP port
    pub port: u16,
    /// Static labels added to every metric, in file order
    #[serde(deserialize_with = "deserialize_tags")]
    pub tags: IndexMap<String, String>,
    /// Override for the auto-detected host name
    pub hostname: Option<String>,
    /// Explicit path to `nvidia-smi`
    pub smi_path: Option<PathBuf>,
    /// Disk usage reporting: `true`, `false` or a list of mountpoint prefixes
    pub disk_usage: Selection,
    /// Network usage reporting: `true`, `false` or a list of interface names
    pub network_usage: Selection,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            caspar_host: None,
            amcp_port: DEFAULT_AMCP_PORT,
            osc_port: DEFAULT_OSC_PORT,
            prefix: Some(DEFAULT_PREFIX.to_string()),
            host: String::new(),
            port: DEFAULT_HTTP_PORT,
            tags: IndexMap::new(),
            hostname: None,
            smi_path: None,
            disk_usage: Selection::default(),
            network_usage: Selection::default(),
        }
    }
}

/// Tag values may be written as JSON numbers or booleans; they are rendered
/// with their JSON text form.
fn deserialize_tags<'de, D>(deserializer: D) -> std::result::Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = IndexMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

impl Settings {
    /// Load settings from `path`, falling back to defaults if the file does
    /// not exist, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = match std::fs::read_to_string(path) {
            Ok(contents) => {
                debug!(path = %path.display(), "Loading settings file");
                Self::from_json(&contents).map_err(|e| {
                    Error::config(format!("Invalid settings file {}: {}", path.display(), e))
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Settings file not found, using defaults");
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };

        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Parse settings from a JSON document; missing keys keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Apply `NEBULA_*` overrides through `lookup`.
    ///
    /// Supported keys:
    /// - `NEBULA_CASPAR_HOST`, `NEBULA_AMCP_PORT`, `NEBULA_OSC_PORT`
    /// - `NEBULA_HOST`, `NEBULA_PORT`
    /// - `NEBULA_PREFIX`, `NEBULA_HOSTNAME`, `NEBULA_SMI_PATH`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("NEBULA_CASPAR_HOST") {
            self.caspar_host = Some(host);
        }

        if let Some(port) = lookup("NEBULA_AMCP_PORT")
            && let Ok(parsed) = port.parse::<u16>()
        {
            self.amcp_port = parsed;
        }

        if let Some(port) = lookup("NEBULA_OSC_PORT")
            && let Ok(parsed) = port.parse::<u16>()
        {
            self.osc_port = parsed;
        }

        if let Some(host) = lookup("NEBULA_HOST") {
            self.host = host;
        }

        if let Some(port) = lookup("NEBULA_PORT")
            && let Ok(parsed) = port.parse::<u16>()
        {
            self.port = parsed;
        }

        if let Some(prefix) = lookup("NEBULA_PREFIX") {
            self.prefix = Some(prefix);
        }

        if let Some(hostname) = lookup("NEBULA_HOSTNAME")
            && !hostname.trim().is_empty()
        {
            self.hostname = Some(hostname);
        }

        if let Some(path) = lookup("NEBULA_SMI_PATH")
            && !path.trim().is_empty()
        {
            self.smi_path = Some(PathBuf::from(path));
        }
    }

    /// The CasparCG host, if the subsystem is enabled.
    pub fn caspar_host(&self) -> Option<&str> {
        self.caspar_host
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
    }

    /// The metric prefix, if one is configured.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref().filter(|prefix| !prefix.is_empty())
    }

    /// HTTP bind address.
    pub fn bind_address(&self) -> &str {
        if self.host.trim().is_empty() {
            "0.0.0.0"
        } else {
            self.host.trim()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.caspar_host(), None);
        assert_eq!(settings.amcp_port, 5250);
        assert_eq!(settings.osc_port, 6250);
        assert_eq!(settings.port, 9731);
        assert_eq!(settings.prefix(), Some("nebula"));
        assert_eq!(settings.bind_address(), "0.0.0.0");
        assert!(settings.disk_usage.is_enabled());
        assert!(settings.network_usage.allow_list().is_none());
    }

    #[test]
    fn test_partial_file_merges_over_defaults() {
        let settings = Settings::from_json(
            r#"{
                "caspar_host": "10.0.0.5",
                "prefix": "",
                "tags": {"site": "studio-b", "env": "prod", "rack": 4},
                "disk_usage": ["/", "/mnt/media"],
                "network_usage": false
            }"#,
        )
        .unwrap();

        assert_eq!(settings.caspar_host(), Some("10.0.0.5"));
        assert_eq!(settings.amcp_port, 5250);
        assert_eq!(settings.prefix(), None);
        let tags: Vec<(&str, &str)> = settings
            .tags
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(tags, vec![("site", "studio-b"), ("env", "prod"), ("rack", "4")]);
        assert_eq!(
            settings.disk_usage.allow_list(),
            Some(&["/".to_string(), "/mnt/media".to_string()][..])
        );
        assert!(!settings.network_usage.is_enabled());
    }

    #[test]
    fn test_blank_caspar_host_disables_subsystem() {
        let settings = Settings::from_json(r#"{"caspar_host": "  "}"#).unwrap();
        assert_eq!(settings.caspar_host(), None);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(Settings::from_json(r#"{"port": "nope"}"#).is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("NEBULA_CASPAR_HOST", "playout-1"),
            ("NEBULA_PORT", "9100"),
            ("NEBULA_OSC_PORT", "not-a-port"),
            ("NEBULA_HOSTNAME", "edge-01"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.caspar_host(), Some("playout-1"));
        assert_eq!(settings.port, 9100);
        assert_eq!(settings.osc_port, 6250);
        assert_eq!(settings.hostname.as_deref(), Some("edge-01"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings.port, Settings::default().port);
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(Error::Configuration(_))
        ));
    }
}
