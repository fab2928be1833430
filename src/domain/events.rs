//! Lineage event types.
//!
//! An event describes one lifecycle transition of a job run together with
//! the datasets it read and wrote. Events are built fresh per lifecycle
//! call, redacted, emitted and dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::facets::FacetMap;

/// A single lineage event (`RunEvent` on the wire)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Lifecycle transition
    pub event_type: EventType,

    /// When the transition happened
    pub event_time: DateTime<Utc>,

    /// URI identifying the producer of this event
    pub producer: String,

    pub run: Run,

    pub job: Job,

    pub inputs: Vec<Dataset>,

    pub outputs: Vec<Dataset>,
}

impl Event {
    /// Whether this event describes a task or a whole workflow run
    pub fn scope(&self) -> JobKind {
        self.job.kind
    }
}

/// Lifecycle transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Start,
    Complete,
    Fail,
}

impl EventType {
    /// Lowercase name used for metric keys
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Start => "start",
            EventType::Complete => "complete",
            EventType::Fail => "fail",
        }
    }
}

/// What kind of unit of work a job represents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    /// A single task instance
    #[default]
    Task,

    /// A whole workflow (DAG) run
    Dag,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Task => "TASK",
            JobKind::Dag => "DAG",
        }
    }
}

/// One execution of a job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    #[serde(rename = "runId")]
    pub run_id: String,

    pub facets: FacetMap,
}

/// The unit of work being executed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub namespace: String,

    /// Unique within the namespace: `{workflow_id}` or `{workflow_id}.{task_id}`
    pub name: String,

    #[serde(skip)]
    pub kind: JobKind,

    pub facets: FacetMap,
}

/// A dataset read or written by a job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub namespace: String,
    pub name: String,
    pub facets: FacetMap,
}

impl Dataset {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            facets: FacetMap::new(),
        }
    }
}
