//! lineage-relay - Lineage events for workflow engines
//!
//! Translates workflow lifecycle transitions (task and run start,
//! completion, failure) into OpenLineage-style run events and sends them to
//! a pluggable transport.
//!
//! # Architecture
//!
//! Every lifecycle call is an independent pipeline:
//! - Facets describing the run and job are composed
//! - The assembled event is redacted so secrets never leave the process
//! - The event is dispatched once, best effort, through the transport
//!
//! Emission never breaks the host: dispatch failures are counted and
//! logged, and workflow-level calls swallow every error.
//!
//! # Modules
//!
//! - `adapters`: Transports (console, noop, host-registered)
//! - `core`: Identity, Redaction, Composer, Emitter, Metrics
//! - `domain`: Data structures (Event, Run, Job, Facet)
//! - `config`: Settings and transport config resolution
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```rust,no_run
//! use lineage_relay::{DagStart, LineageEmitter, LineageSettings, TransportRegistry};
//!
//! let settings = LineageSettings::from_env()?;
//! let emitter = LineageEmitter::new(settings, TransportRegistry::with_builtins())?;
//!
//! emitter.dag_started(DagStart {
//!     dag_id: "daily_etl".to_string(),
//!     logical_date: "2024-01-01T00:00:00Z".to_string(),
//!     start_date: "2024-01-01T00:05:00Z".to_string(),
//!     ..Default::default()
//! });
//! # Ok::<(), lineage_relay::LineageError>(())
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;

// Re-export main types at crate root for convenience
pub use adapters::{LineageClient, Transport, TransportRegistry};
pub use config::{ClientConfig, ConfigResolver, LineageSettings, TransportConfig};
pub use core::{DagEnd, DagStart, LineageEmitter, TaskEnd, TaskStart};
pub use domain::{Dataset, Event, EventType, Facet, FacetMap, JobKind, TaskFailure, TaskLineageMetadata};
pub use error::LineageError;
