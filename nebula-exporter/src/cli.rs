use std::path::PathBuf;

use clap::Parser;

/// Prometheus exporter for Nebula broadcast hosts and CasparCG servers.
#[derive(Parser, Debug)]
#[command(name = "nebula-exporter", version, about, long_about = None)]
pub struct Args {
    /// Settings file (JSON). Missing file means built-in defaults.
    #[arg(short, long, default_value = "settings.json")]
    pub config: PathBuf,

    /// Log filter directive, e.g. `nebula_exporter=debug`. `RUST_LOG` wins.
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Also write daily rotated log files to this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}
