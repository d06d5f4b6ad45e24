//! Host and CasparCG metrics in the text exposition format.

pub mod aggregator;
pub mod disk;
pub mod gpu;
pub mod host;
pub mod network;
pub mod render;

pub use aggregator::MetricsAggregator;
pub use render::MetricRenderer;
