//! Core lineage logic.
//!
//! This module contains:
//! - Identity: Deterministic run identifiers
//! - Redaction: Masking of sensitive values
//! - Composer: Facet composition into runs and jobs
//! - Emitter: Lifecycle calls, dispatch and failure isolation
//! - Metrics: Emission counters and timers, reported through the `metrics` facade

pub mod composer;
pub mod emitter;
pub mod identity;
pub mod metrics;
pub mod redaction;

// Re-export commonly used types
pub use composer::{merge_facets, parse_timestamp, FacetComposer};
pub use emitter::{DagEnd, DagStart, LineageEmitter, TaskEnd, TaskStart};
pub use identity::{derive_cleared_run_id, derive_run_id, derive_task_run_id};
pub use redaction::{MaskerConfig, PatternMasker, Redactor, SecretsMasker};
