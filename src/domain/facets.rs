//! Facets: named, structured sub-records attached to runs, jobs and datasets.
//!
//! Facets form a closed set of variants so that composition and redaction
//! can treat them uniformly. Anything a producer supplies that has no typed
//! variant travels as [`Facet::Custom`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Facet name -> facet. Overlaying two maps is a key union where the
/// right-hand side wins.
pub type FacetMap = BTreeMap<String, Facet>;

pub const NOMINAL_TIME: &str = "nominalTime";
pub const OWNERSHIP: &str = "ownership";
pub const DOCUMENTATION: &str = "documentation";
pub const SOURCE_CODE_LOCATION: &str = "sourceCodeLocation";
pub const ERROR_MESSAGE: &str = "errorMessage";
pub const JOB_TYPE: &str = "jobType";
pub const PROCESSING_ENGINE: &str = "processing_engine";
pub const WORKFLOW_STATE: &str = "workflowState";

/// A single facet payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Facet {
    NominalTime(NominalTimeFacet),
    Ownership(OwnershipFacet),
    Documentation(DocumentationFacet),
    SourceLocation(SourceLocationFacet),
    ErrorMessage(ErrorMessageFacet),
    JobType(JobTypeFacet),
    ProcessingEngine(ProcessingEngineFacet),
    WorkflowState(WorkflowStateFacet),
    Custom(Value),
}

impl Facet {
    /// Render the facet as a tree of primitives
    pub fn to_payload(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Rebuild a facet of the same variant from a (possibly rewritten)
    /// payload. Falls back to [`Facet::Custom`] when the payload no longer
    /// fits the typed variant.
    pub fn with_payload(&self, payload: Value) -> Facet {
        fn restore<T: DeserializeOwned>(payload: Value, wrap: impl FnOnce(T) -> Facet) -> Facet {
            match serde_json::from_value::<T>(payload.clone()) {
                Ok(typed) => wrap(typed),
                Err(_) => Facet::Custom(payload),
            }
        }

        match self {
            Facet::NominalTime(_) => restore(payload, Facet::NominalTime),
            Facet::Ownership(_) => restore(payload, Facet::Ownership),
            Facet::Documentation(_) => restore(payload, Facet::Documentation),
            Facet::SourceLocation(_) => restore(payload, Facet::SourceLocation),
            Facet::ErrorMessage(_) => restore(payload, Facet::ErrorMessage),
            Facet::JobType(_) => restore(payload, Facet::JobType),
            Facet::ProcessingEngine(_) => restore(payload, Facet::ProcessingEngine),
            Facet::WorkflowState(_) => restore(payload, Facet::WorkflowState),
            Facet::Custom(_) => Facet::Custom(payload),
        }
    }
}

/// Scheduled time window of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominalTimeFacet {
    pub nominal_start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal_end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub owner_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipFacet {
    pub owners: Vec<Owner>,
}

impl OwnershipFacet {
    /// Owners are always listed in lexicographic order
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        names.sort_unstable();
        Self {
            owners: names
                .into_iter()
                .map(|name| Owner {
                    name: name.to_string(),
                    owner_type: None,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationFacet {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocationFacet {
    #[serde(rename = "type")]
    pub location_type: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessageFacet {
    pub message: String,
    pub programming_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

/// Classification of a job (task vs whole workflow run)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTypeFacet {
    pub processing_type: String,
    pub integration: String,
    pub job_type: String,
}

/// Describes the engine that produced the event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingEngineFacet {
    pub name: String,
    pub version: String,
    pub openlineage_adapter_version: String,
}

/// Final state of a workflow run and the tasks it contained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStateFacet {
    pub run_state: String,
    pub task_ids: Vec<String>,
}
