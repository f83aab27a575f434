//! Node-level observability: Prometheus metrics and their HTTP exporter.

pub mod prometheus;

pub use prometheus::{MetricsRegistry, NodeMetrics};
