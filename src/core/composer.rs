//! Builds the run and job records of a lineage event.
//!
//! Merge order is significant. Built-in facets go first, producer-supplied
//! facets are overlaid on top, and the job type facet is applied last so
//! that no custom facet can reclassify a job.

use chrono::{DateTime, Utc};

use crate::domain::facets::{
    DOCUMENTATION, JOB_TYPE, NOMINAL_TIME, OWNERSHIP, PROCESSING_ENGINE, SOURCE_CODE_LOCATION,
};
use crate::domain::{
    DocumentationFacet, Facet, FacetMap, Job, JobKind, JobTypeFacet, NominalTimeFacet,
    OwnershipFacet, ProcessingEngineFacet, Run, SourceLocationFacet,
};
use crate::error::{LineageError, Result};

/// Processing type reported in the job type facet
pub const PROCESSING_TYPE: &str = "BATCH";

/// Composes facets into runs and jobs for one namespace
#[derive(Debug, Clone)]
pub struct FacetComposer {
    namespace: String,
    integration: String,
    engine: ProcessingEngineFacet,
}

impl FacetComposer {
    pub fn new(
        namespace: impl Into<String>,
        integration: impl Into<String>,
        engine: ProcessingEngineFacet,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            integration: integration.into(),
            engine,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Build a run. `run_facets` are overlaid on the synthesized
    /// `nominalTime` facet.
    pub fn build_run(
        &self,
        run_id: &str,
        nominal_start: Option<DateTime<Utc>>,
        nominal_end: Option<DateTime<Utc>>,
        run_facets: FacetMap,
    ) -> Run {
        let mut facets = FacetMap::new();

        if let Some(nominal_start_time) = nominal_start {
            facets.insert(
                NOMINAL_TIME.to_string(),
                Facet::NominalTime(NominalTimeFacet {
                    nominal_start_time,
                    nominal_end_time: nominal_end,
                }),
            );
        }

        Run {
            run_id: run_id.to_string(),
            facets: merge_facets(facets, run_facets),
        }
    }

    /// Build a job. The `jobType` facet always reflects `kind`.
    pub fn build_job(
        &self,
        name: &str,
        kind: JobKind,
        description: Option<&str>,
        code_location: Option<&str>,
        owners: Option<&[String]>,
        job_facets: Option<&FacetMap>,
    ) -> Job {
        let mut facets = FacetMap::new();

        if let Some(description) = description.filter(|d| !d.is_empty()) {
            facets.insert(
                DOCUMENTATION.to_string(),
                Facet::Documentation(DocumentationFacet {
                    description: description.to_string(),
                }),
            );
        }

        if let Some(url) = code_location.filter(|c| !c.is_empty()) {
            facets.insert(
                SOURCE_CODE_LOCATION.to_string(),
                Facet::SourceLocation(SourceLocationFacet {
                    location_type: String::new(),
                    url: url.to_string(),
                }),
            );
        }

        if let Some(owners) = owners.filter(|o| !o.is_empty()) {
            facets.insert(
                OWNERSHIP.to_string(),
                Facet::Ownership(OwnershipFacet::from_names(owners)),
            );
        }

        if let Some(job_facets) = job_facets {
            facets = merge_facets(facets, job_facets.clone());
        }

        facets.insert(JOB_TYPE.to_string(), self.job_type_facet(kind));

        Job {
            namespace: self.namespace.clone(),
            name: name.to_string(),
            kind,
            facets,
        }
    }

    pub fn job_type_facet(&self, kind: JobKind) -> Facet {
        Facet::JobType(JobTypeFacet {
            processing_type: PROCESSING_TYPE.to_string(),
            integration: self.integration.clone(),
            job_type: kind.as_str().to_string(),
        })
    }

    /// The engine descriptor attached to every run
    pub fn processing_engine_facet(&self) -> FacetMap {
        let mut facets = FacetMap::new();
        facets.insert(
            PROCESSING_ENGINE.to_string(),
            Facet::ProcessingEngine(self.engine.clone()),
        );
        facets
    }
}

/// Key union of two facet maps; `overlay` wins on collision
pub fn merge_facets(mut base: FacetMap, overlay: FacetMap) -> FacetMap {
    base.extend(overlay);
    base
}

/// Parse an RFC 3339 timestamp supplied by the host
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| LineageError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}

/// Parse an optional timestamp; `None` and empty strings stay `None`
pub fn parse_optional_timestamp(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value
        .filter(|v| !v.is_empty())
        .map(parse_timestamp)
        .transpose()
}
