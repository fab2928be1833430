//! Error types for lineage emission.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the lineage API.
///
/// Dispatch failures never reach callers of [`crate::LineageEmitter::emit`];
/// the `Transport` variant exists for transports and registries that report
/// construction problems.
#[derive(Debug, Error)]
pub enum LineageError {
    #[error("Failed to load lineage config from {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Invalid lineage settings: {0}")]
    Settings(String),

    #[error("Unknown transport type: {0}")]
    UnknownTransport(String),

    #[error("Invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Failed to compose lineage event: {0}")]
    Composition(String),

    #[error("Transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LineageError>;
