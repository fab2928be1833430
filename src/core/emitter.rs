//! Lineage event emitter.
//!
//! Translates lifecycle transitions of the host workflow engine into
//! lineage events, redacts them and hands them to the transport.
//!
//! Emission is best effort. Dispatch failures are counted and logged but
//! never returned. Workflow-level calls (`dag_*`) additionally swallow any
//! failure while composing the event, panics included. Task-level calls
//! return composition errors to the host.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::adapters::TransportRegistry;
use crate::config::{ConfigResolver, LineageSettings};
use crate::domain::facets::{ERROR_MESSAGE, WORKFLOW_STATE};
use crate::domain::{
    Dataset, ErrorMessageFacet, Event, EventType, Facet, FacetMap, Job, JobKind, Run,
    TaskFailure, TaskLineageMetadata, WorkflowStateFacet,
};
use crate::error::{LineageError, Result};

use super::composer::{merge_facets, parse_optional_timestamp, parse_timestamp, FacetComposer};
use super::identity::derive_cleared_run_id;
use super::metrics::{names, record_emit_failure, time_emit_attempt};
use super::redaction::{PatternMasker, Redactor, SecretsMasker, DEFAULT_MAX_DEPTH};

/// Language reported in `errorMessage` facets
pub const PROGRAMMING_LANGUAGE: &str = "rust";

/// A task instance started
#[derive(Debug, Clone, Default)]
pub struct TaskStart {
    /// Globally unique identifier of the task run
    pub run_id: String,
    /// `{workflow_id}.{task_id}`
    pub job_name: String,
    pub job_description: Option<String>,
    /// RFC 3339
    pub event_time: String,
    /// File path or URL of the workflow definition
    pub code_location: Option<String>,
    pub nominal_start_time: Option<String>,
    pub nominal_end_time: Option<String>,
    pub owners: Option<Vec<String>>,
    pub task: Option<TaskLineageMetadata>,
    /// Overrides facets supplied by `task`
    pub run_facets: FacetMap,
}

/// A task instance finished, successfully or not
#[derive(Debug, Clone, Default)]
pub struct TaskEnd {
    pub run_id: String,
    pub job_name: String,
    /// RFC 3339
    pub end_time: String,
    pub owners: Option<Vec<String>>,
    pub task: Option<TaskLineageMetadata>,
    pub run_facets: FacetMap,
}

/// A workflow run started
#[derive(Debug, Clone, Default)]
pub struct DagStart {
    pub dag_id: String,
    /// RFC 3339; seeds the run id
    pub logical_date: String,
    /// RFC 3339; the event time
    pub start_date: String,
    pub nominal_start_time: Option<String>,
    pub nominal_end_time: Option<String>,
    pub owners: Option<Vec<String>>,
    pub run_facets: FacetMap,
    /// Number of times the run was cleared
    pub clear_number: u32,
    pub description: Option<String>,
    pub job_facets: Option<FacetMap>,
}

/// A workflow run finished
#[derive(Debug, Clone, Default)]
pub struct DagEnd {
    pub dag_id: String,
    /// RFC 3339; the event time
    pub end_date: String,
    /// RFC 3339; seeds the run id
    pub logical_date: String,
    pub clear_number: u32,
    /// Final state of the run as reported by the host (e.g. "success")
    pub run_state: String,
    pub task_ids: Vec<String>,
    pub owners: Option<Vec<String>>,
    pub run_facets: FacetMap,
}

/// Emits lineage events for workflow lifecycle transitions
pub struct LineageEmitter {
    composer: FacetComposer,
    redactor: Redactor,
    resolver: ConfigResolver,
    producer: String,
}

impl std::fmt::Debug for LineageEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineageEmitter")
            .field("namespace", &self.composer.namespace())
            .field("producer", &self.producer)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl LineageEmitter {
    /// Create an emitter whose client is resolved lazily from `settings`
    pub fn new(settings: LineageSettings, registry: TransportRegistry) -> Result<Self> {
        Self::from_resolver(ConfigResolver::new(settings, registry))
    }

    /// Create an emitter around an existing resolver
    pub fn from_resolver(resolver: ConfigResolver) -> Result<Self> {
        let settings = resolver.settings();
        let masker = PatternMasker::new(&settings.masker)
            .map_err(|e| LineageError::Settings(e.to_string()))?;

        Ok(Self {
            composer: FacetComposer::new(
                settings.namespace.clone(),
                settings.integration.clone(),
                settings.processing_engine(),
            ),
            redactor: Redactor::new(Arc::new(masker)),
            producer: settings.producer.clone(),
            resolver,
        })
    }

    /// Replace the secrets masker (usually with the host's own)
    pub fn with_masker(mut self, masker: Arc<dyn SecretsMasker>) -> Self {
        self.redactor = Redactor::new(masker);
        self
    }

    pub fn composer(&self) -> &FacetComposer {
        &self.composer
    }

    /// Emit a START event for a task instance
    #[instrument(skip(self, call), fields(job = %call.job_name, run_id = %call.run_id))]
    pub fn start_task(&self, call: TaskStart) -> Result<Event> {
        let event_time = parse_timestamp(&call.event_time)?;
        let nominal_start = parse_optional_timestamp(call.nominal_start_time.as_deref())?;
        let nominal_end = parse_optional_timestamp(call.nominal_end_time.as_deref())?;

        let run_facets = self.task_run_facets(call.task.as_ref(), call.run_facets);
        let run = self
            .composer
            .build_run(&call.run_id, nominal_start, nominal_end, run_facets);
        let job = self.composer.build_job(
            &call.job_name,
            JobKind::Task,
            call.job_description.as_deref(),
            call.code_location.as_deref(),
            call.owners.as_deref(),
            call.task.as_ref().map(|t| &t.job_facets),
        );

        let event = self.assemble(EventType::Start, event_time, run, job, call.task)?;
        self.emit(event)
    }

    /// Emit a COMPLETE event for a task instance
    #[instrument(skip(self, call), fields(job = %call.job_name, run_id = %call.run_id))]
    pub fn complete_task(&self, call: TaskEnd) -> Result<Event> {
        let event = self.task_end_event(EventType::Complete, call, None)?;
        self.emit(event)
    }

    /// Emit a FAIL event for a task instance, carrying `error` in the
    /// `errorMessage` run facet
    #[instrument(skip(self, call, error), fields(job = %call.job_name, run_id = %call.run_id))]
    pub fn fail_task(&self, call: TaskEnd, error: Option<TaskFailure>) -> Result<Event> {
        let event = self.task_end_event(EventType::Fail, call, error)?;
        self.emit(event)
    }

    /// Emit a START event for a workflow run. Never fails.
    #[instrument(skip(self, call), fields(dag_id = %call.dag_id))]
    pub fn dag_started(&self, call: DagStart) -> Option<Event> {
        isolate("started", &call.dag_id.clone(), || {
            let event_time = parse_timestamp(&call.start_date)?;
            let logical_date = parse_timestamp(&call.logical_date)?;
            let nominal_start = parse_optional_timestamp(call.nominal_start_time.as_deref())?;
            let nominal_end = parse_optional_timestamp(call.nominal_end_time.as_deref())?;

            let run_id = self.dag_run_id(&call.dag_id, logical_date, call.clear_number);
            let run_facets = merge_facets(call.run_facets, self.composer.processing_engine_facet());
            let run = self
                .composer
                .build_run(&run_id, nominal_start, nominal_end, run_facets);
            let job = self.composer.build_job(
                &call.dag_id,
                JobKind::Dag,
                call.description.as_deref(),
                None,
                call.owners.as_deref(),
                call.job_facets.as_ref(),
            );

            let event = self.assemble(EventType::Start, event_time, run, job, None)?;
            self.emit(event)
        })
    }

    /// Emit a COMPLETE event for a workflow run. Never fails.
    #[instrument(skip(self, call), fields(dag_id = %call.dag_id))]
    pub fn dag_success(&self, call: DagEnd) -> Option<Event> {
        isolate("success", &call.dag_id.clone(), || {
            let event = self.dag_end_event(EventType::Complete, call, FacetMap::new())?;
            self.emit(event)
        })
    }

    /// Emit a FAIL event for a workflow run with `message` in the
    /// `errorMessage` run facet. Never fails.
    #[instrument(skip(self, call, message), fields(dag_id = %call.dag_id))]
    pub fn dag_failed(&self, call: DagEnd, message: &str) -> Option<Event> {
        isolate("failed", &call.dag_id.clone(), || {
            let mut facets = FacetMap::new();
            facets.insert(
                ERROR_MESSAGE.to_string(),
                error_message_facet(TaskFailure::new(message)),
            );

            let event = self.dag_end_event(EventType::Fail, call, facets)?;
            self.emit(event)
        })
    }

    /// Redact and send an event, returning the redacted event.
    ///
    /// Only configuration errors (raised while constructing the client on
    /// first use) are returned; dispatch failures are recorded and dropped.
    pub fn emit(&self, event: Event) -> Result<Event> {
        let client = self.resolver.get_client()?;
        let redacted = self.redactor.redact(&event, DEFAULT_MAX_DEPTH);

        let event_type = event.event_type.as_str();
        let transport_kind = client.transport_kind();
        let run_id = event.run.run_id.as_str();

        let outcome = {
            let _by_kind = time_emit_attempt(names::emit_attempts_for(event_type, &transport_kind));
            let _all = time_emit_attempt(names::EMIT_ATTEMPTS);
            panic::catch_unwind(AssertUnwindSafe(|| client.emit(&redacted)))
        };

        match outcome {
            Ok(Ok(())) => {
                info!(
                    event_type = %event_type.to_uppercase(),
                    run_id,
                    transport = %transport_kind,
                    "Successfully emitted lineage event"
                );
            }
            Ok(Err(e)) => {
                self.record_failure(event_type, run_id, &format!("{:#}", e), &format!("{:?}", e));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.record_failure(event_type, run_id, &message, "transport panicked");
            }
        }

        Ok(redacted)
    }

    fn record_failure(&self, event_type: &str, run_id: &str, message: &str, details: &str) {
        record_emit_failure();
        warn!(
            event_type = %event_type.to_uppercase(),
            run_id,
            error = %message,
            "Failed to emit lineage event"
        );
        debug!(details, "Lineage emission failure details");
    }

    fn task_end_event(
        &self,
        event_type: EventType,
        call: TaskEnd,
        error: Option<TaskFailure>,
    ) -> Result<Event> {
        let event_time = parse_timestamp(&call.end_time)?;

        let mut run_facets = self.task_run_facets(call.task.as_ref(), call.run_facets);
        if let Some(error) = error {
            run_facets.insert(ERROR_MESSAGE.to_string(), error_message_facet(error));
        }

        let run = self.composer.build_run(&call.run_id, None, None, run_facets);
        let job = self.composer.build_job(
            &call.job_name,
            JobKind::Task,
            None,
            None,
            call.owners.as_deref(),
            call.task.as_ref().map(|t| &t.job_facets),
        );

        self.assemble(event_type, event_time, run, job, call.task)
    }

    fn dag_end_event(&self, event_type: EventType, call: DagEnd, base: FacetMap) -> Result<Event> {
        let event_time = parse_timestamp(&call.end_date)?;
        let logical_date = parse_timestamp(&call.logical_date)?;
        let run_id = self.dag_run_id(&call.dag_id, logical_date, call.clear_number);

        let mut facets = base;
        facets.insert(
            WORKFLOW_STATE.to_string(),
            Facet::WorkflowState(WorkflowStateFacet {
                run_state: call.run_state,
                task_ids: call.task_ids,
            }),
        );
        let facets = merge_facets(facets, self.composer.processing_engine_facet());
        let facets = merge_facets(facets, call.run_facets);

        let run = self.composer.build_run(&run_id, None, None, facets);
        let job = self.composer.build_job(
            &call.dag_id,
            JobKind::Dag,
            None,
            None,
            call.owners.as_deref(),
            None,
        );

        self.assemble(event_type, event_time, run, job, None)
    }

    /// Task metadata facets, overridden by the caller's, then the engine
    /// descriptor
    fn task_run_facets(&self, task: Option<&TaskLineageMetadata>, run_facets: FacetMap) -> FacetMap {
        let facets = match task {
            Some(task) => merge_facets(task.run_facets.clone(), run_facets),
            None => run_facets,
        };
        merge_facets(facets, self.composer.processing_engine_facet())
    }

    fn dag_run_id(&self, dag_id: &str, logical_date: DateTime<Utc>, clear_number: u32) -> String {
        derive_cleared_run_id(self.composer.namespace(), dag_id, logical_date, clear_number)
            .to_string()
    }

    fn assemble(
        &self,
        event_type: EventType,
        event_time: DateTime<Utc>,
        run: Run,
        job: Job,
        task: Option<TaskLineageMetadata>,
    ) -> Result<Event> {
        if run.run_id.trim().is_empty() {
            return Err(LineageError::Composition("run id is empty".to_string()));
        }
        if job.name.trim().is_empty() {
            return Err(LineageError::Composition("job name is empty".to_string()));
        }

        let (inputs, outputs): (Vec<Dataset>, Vec<Dataset>) = match task {
            Some(task) => (task.inputs, task.outputs),
            None => (Vec::new(), Vec::new()),
        };

        Ok(Event {
            event_type,
            event_time,
            producer: self.producer.clone(),
            run,
            job,
            inputs,
            outputs,
        })
    }
}

fn error_message_facet(error: TaskFailure) -> Facet {
    Facet::ErrorMessage(ErrorMessageFacet {
        message: error.message,
        programming_language: PROGRAMMING_LANGUAGE.to_string(),
        stack_trace: error.stack_trace,
    })
}

/// Run a workflow-level build-and-emit sequence, suppressing every failure
fn isolate<F>(transition: &str, dag_id: &str, build: F) -> Option<Event>
where
    F: FnOnce() -> Result<Event>,
{
    match panic::catch_unwind(AssertUnwindSafe(build)) {
        Ok(Ok(event)) => Some(event),
        Ok(Err(e)) => {
            warn!(
                dag_id,
                error = %e,
                details = ?e,
                "Failed to emit lineage DAG {} event", transition
            );
            None
        }
        Err(payload) => {
            let backtrace = Backtrace::capture();
            warn!(
                dag_id,
                panic = %panic_message(payload.as_ref()),
                backtrace = %backtrace,
                "Failed to emit lineage DAG {} event", transition
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
