//! Inputs supplied by the host engine for task-level lifecycle calls.

use super::events::Dataset;
use super::facets::FacetMap;

/// Lineage metadata pre-extracted from a task instance by the host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskLineageMetadata {
    pub inputs: Vec<Dataset>,
    pub outputs: Vec<Dataset>,
    pub run_facets: FacetMap,
    pub job_facets: FacetMap,
}

/// The error that failed a task, as reported in the `errorMessage` facet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub message: String,
    pub stack_trace: Option<String>,
}

impl TaskFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: None,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
}

impl From<&str> for TaskFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for TaskFailure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// The debug rendering of an `anyhow::Error` carries the cause chain and,
/// when captured, the backtrace.
impl From<&anyhow::Error> for TaskFailure {
    fn from(error: &anyhow::Error) -> Self {
        Self {
            message: error.to_string(),
            stack_trace: Some(format!("{:?}", error)),
        }
    }
}
