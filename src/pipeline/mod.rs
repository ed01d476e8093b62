// Data processing pipeline: ingestion, processing, loading, and the published snapshot

pub mod ingestion;
pub mod loader;
pub mod processing;
pub mod snapshot;

// Re-export key types and functions from each stage
pub use ingestion::{ResourceKind, SourcePayload};
pub use loader::{AcceptancePolicy, DatasetLoader, LoadReport};
pub use snapshot::{Dataset, LoadStats, SnapshotStore};
