//! Metrics for the ingestion pipeline
//!
//! Recording goes through the `metrics` facade, so every call is a no-op
//! until a recorder is installed (see [`install_prometheus`]).

use std::fmt;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::{IngestError, Result};

/// Enum representing all metric names used by the loader
/// This eliminates magic strings and provides compile-time safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Loader metrics
    LoaderPayloadsProcessed,
    LoaderRecordsDetected,
    LoaderRecordsExcluded,
    LoaderDiagnostics,
    LoaderMatchIdsSynthesized,
    LoaderUnknownStatuses,
    LoaderDuration,

    // Snapshot metrics
    SnapshotPublished,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::LoaderPayloadsProcessed => "rugby_loader_payloads_processed_total",
            MetricName::LoaderRecordsDetected => "rugby_loader_records_detected_total",
            MetricName::LoaderRecordsExcluded => "rugby_loader_records_excluded_total",
            MetricName::LoaderDiagnostics => "rugby_loader_diagnostics_total",
            MetricName::LoaderMatchIdsSynthesized => "rugby_loader_match_ids_synthesized_total",
            MetricName::LoaderUnknownStatuses => "rugby_loader_unknown_statuses_total",
            MetricName::LoaderDuration => "rugby_loader_duration_seconds",
            MetricName::SnapshotPublished => "rugby_snapshot_published_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            LoaderPayloadsProcessed,
            LoaderRecordsDetected,
            LoaderRecordsExcluded,
            LoaderDiagnostics,
            LoaderMatchIdsSynthesized,
            LoaderUnknownStatuses,
            LoaderDuration,
            SnapshotPublished,
        ]
        .into_iter()
    }

    /// (phase, description)
    pub fn metadata(&self) -> (&'static str, &'static str) {
        match self {
            MetricName::LoaderPayloadsProcessed => ("loader", "Payloads processed by resource"),
            MetricName::LoaderRecordsDetected => ("loader", "Records by resource and detected schema version"),
            MetricName::LoaderRecordsExcluded => ("loader", "Records excluded from the snapshot"),
            MetricName::LoaderDiagnostics => ("loader", "Diagnostics by kind and severity"),
            MetricName::LoaderMatchIdsSynthesized => ("loader", "Match ids synthesized for legacy records"),
            MetricName::LoaderUnknownStatuses => ("loader", "Matches whose status is outside the known set"),
            MetricName::LoaderDuration => ("loader", "Load duration in seconds"),
            MetricName::SnapshotPublished => ("snapshot", "Snapshots published"),
        }
    }
}

/// Install the Prometheus recorder and return its handle for rendering.
pub fn install_prometheus() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| IngestError::Metrics(format!("Failed to install Prometheus recorder: {}", e)))?;

    for metric in MetricName::all_metrics() {
        let (_, description) = metric.metadata();
        if metric == MetricName::LoaderDuration {
            ::metrics::describe_histogram!(metric.as_str(), ::metrics::Unit::Seconds, description);
        } else {
            ::metrics::describe_counter!(metric.as_str(), description);
        }
    }

    info!("Metrics system initialized");
    Ok(handle)
}

// ============================================================================
// Loader Metrics
// ============================================================================

pub mod loader {
    use super::MetricName;

    pub fn payload_processed(resource: &'static str) {
        ::metrics::counter!(MetricName::LoaderPayloadsProcessed.as_str(), "resource" => resource).increment(1);
    }

    pub fn record_detected(resource: &'static str, version: &'static str) {
        ::metrics::counter!(
            MetricName::LoaderRecordsDetected.as_str(),
            "resource" => resource,
            "version" => version
        )
        .increment(1);
    }

    pub fn record_excluded(resource: &'static str) {
        ::metrics::counter!(MetricName::LoaderRecordsExcluded.as_str(), "resource" => resource).increment(1);
    }

    pub fn diagnostic(kind: &'static str, severity: &'static str) {
        ::metrics::counter!(
            MetricName::LoaderDiagnostics.as_str(),
            "kind" => kind,
            "severity" => severity
        )
        .increment(1);
    }

    pub fn match_id_synthesized() {
        ::metrics::counter!(MetricName::LoaderMatchIdsSynthesized.as_str()).increment(1);
    }

    pub fn unknown_status(status: &str) {
        ::metrics::counter!(
            MetricName::LoaderUnknownStatuses.as_str(),
            "status" => status.to_string()
        )
        .increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::LoaderDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Snapshot Metrics
// ============================================================================

pub mod snapshot {
    use super::MetricName;

    pub fn published() {
        ::metrics::counter!(MetricName::SnapshotPublished.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_unique_and_prefixed() {
        let names: std::collections::HashSet<_> = MetricName::all_metrics().map(|m| m.as_str()).collect();
        assert_eq!(names.len(), MetricName::all_metrics().count());
        assert!(names.iter().all(|n| n.starts_with("rugby_")));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        loader::payload_processed("matches");
        loader::unknown_status("abandoned");
        snapshot::published();
    }
}
