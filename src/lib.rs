pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;

// Domain data shapes shared across layers
pub mod domain;

pub use error::{IngestError, Result};
pub use pipeline::{AcceptancePolicy, Dataset, DatasetLoader, LoadReport, ResourceKind, SnapshotStore, SourcePayload};
