//! Domain types for lineage emission.
//!
//! This module contains the core data structures:
//! - Events: Run, Job and Dataset records making up a lineage event
//! - Facets: Named payloads attached to runs, jobs and datasets
//! - Task: Metadata the host engine extracts from a task instance

pub mod events;
pub mod facets;
pub mod task;

// Re-export commonly used types
pub use events::{Dataset, Event, EventType, Job, JobKind, Run};
pub use facets::{
    DocumentationFacet, ErrorMessageFacet, Facet, FacetMap, JobTypeFacet, NominalTimeFacet, Owner,
    OwnershipFacet, ProcessingEngineFacet, SourceLocationFacet, WorkflowStateFacet,
};
pub use task::{TaskFailure, TaskLineageMetadata};
