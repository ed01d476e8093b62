// Observability: metrics for the load pipeline

pub mod metrics;

pub use metrics::{install_prometheus, MetricName};
