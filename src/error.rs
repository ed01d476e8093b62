use thiserror::Error;

use crate::pipeline::processing::diagnostics::DiagnosticKind;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("payload from '{origin}' is not valid JSON: {source}")]
    Decode {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("snapshot rejected: {count} {kind} diagnostic(s)")]
    Rejected { kind: DiagnosticKind, count: usize },
}

pub type Result<T> = std::result::Result<T, IngestError>;
