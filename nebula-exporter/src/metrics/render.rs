//! Exposition line rendering.

use std::fmt::{self, Display, Write};

use indexmap::IndexMap;

use crate::config::Settings;

/// Renders `[prefix_]name{tags} value` lines.
///
/// Every line carries the call-site tags, then `hostname`, then the static
/// tags from the settings. Later keys replace earlier ones in place. Tag
/// values are written verbatim.
#[derive(Debug, Clone)]
pub struct MetricRenderer {
    prefix: Option<String>,
    hostname: String,
    tags: IndexMap<String, String>,
}

impl MetricRenderer {
    pub fn new(
        prefix: Option<&str>,
        hostname: impl Into<String>,
        tags: IndexMap<String, String>,
    ) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
            hostname: hostname.into(),
            tags,
        }
    }

    /// Build from settings; `local_hostname` is used unless overridden.
    pub fn from_settings(settings: &Settings, local_hostname: &str) -> Self {
        let hostname = settings
            .hostname
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(local_hostname);
        Self::new(settings.prefix(), hostname, settings.tags.clone())
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Append one line to `out`.
    pub fn write_metric(
        &self,
        out: &mut String,
        name: &str,
        value: impl Display,
        tags: &[(&str, &dyn Display)],
    ) -> fmt::Result {
        let mut merged: IndexMap<&str, &dyn Display> =
            IndexMap::with_capacity(tags.len() + 1 + self.tags.len());
        for (key, tag) in tags {
            merged.insert(*key, *tag);
        }
        merged.insert("hostname", &self.hostname);
        for (key, tag) in &self.tags {
            merged.insert(key.as_str(), tag);
        }

        if let Some(prefix) = &self.prefix {
            write!(out, "{}_", prefix)?;
        }
        write!(out, "{}{{", name)?;
        for (i, (key, tag)) in merged.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write!(out, "{}=\"{}\"", key, tag)?;
        }
        writeln!(out, "}} {}", value)
    }

    /// Render one line.
    pub fn render(&self, name: &str, value: impl Display, tags: &[(&str, &dyn Display)]) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_metric(&mut out, name, value, tags);
        out
    }
}
