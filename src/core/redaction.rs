//! Redaction of sensitive values before events leave the process.
//!
//! The redactor walks every facet of an event (run, job, inputs, outputs)
//! and masks values that a [`SecretsMasker`] flags as sensitive. Traversal
//! is bounded: anything deeper than `max_depth` is replaced by a marker
//! instead of being inspected.
//!
//! Depth counting starts at the event (0). Run, job and each dataset sit at
//! depth 1, facets at depth 2, and facet payload fields below that.

use std::collections::HashSet;
use std::sync::Arc;

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{Dataset, Event, Facet, FacetMap, Job, Run};

/// Replacement for sensitive values
pub const MASK: &str = "***";

/// Replacement for subtrees beyond the depth limit
pub const DEPTH_MARKER: &str = "<redaction depth exceeded>";

/// Depth limit used when emitting events
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Decides whether a field name or value is sensitive.
///
/// Usually supplied by the host engine, which already knows its secrets.
pub trait SecretsMasker: Send + Sync {
    /// Whether values stored under this field name must be masked
    fn is_sensitive_name(&self, name: &str) -> bool;

    /// Whether this string value must be masked wherever it appears
    fn is_sensitive_value(&self, value: &str) -> bool;

    /// Masked rendering of `value`, or `None` when it is not sensitive.
    /// Defaults to masking the whole string.
    fn mask_value(&self, value: &str) -> Option<String> {
        self.is_sensitive_value(value).then(|| MASK.to_string())
    }
}

/// Configuration for [`PatternMasker`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskerConfig {
    /// Case-insensitive glob patterns matched against field names
    #[serde(default = "default_sensitive_names")]
    pub sensitive_names: Vec<String>,

    /// Regular expressions matched against string values
    #[serde(default)]
    pub value_patterns: Vec<String>,
}

fn default_sensitive_names() -> Vec<String> {
    [
        "*password*",
        "*passwd*",
        "*secret*",
        "*token*",
        "*api_key*",
        "*apikey*",
        "*authorization*",
        "*private_key*",
        "*passphrase*",
        "*credential*",
        "*keyfile_dict*",
        "*service_account*",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl Default for MaskerConfig {
    fn default() -> Self {
        Self {
            sensitive_names: default_sensitive_names(),
            value_patterns: Vec::new(),
        }
    }
}

/// Invalid masker configuration
#[derive(Debug, Clone, Error)]
pub enum MaskerError {
    #[error("Invalid sensitive name pattern '{pattern}': {message}")]
    NamePattern { pattern: String, message: String },

    #[error("Invalid value pattern '{pattern}': {message}")]
    ValuePattern { pattern: String, message: String },
}

/// [`SecretsMasker`] backed by a field-name deny-list, value patterns and
/// registered literal secrets
#[derive(Debug, Clone, Default)]
pub struct PatternMasker {
    names: Vec<Pattern>,
    values: Vec<Regex>,
    secrets: HashSet<String>,
}

impl PatternMasker {
    pub fn new(config: &MaskerConfig) -> Result<Self, MaskerError> {
        let names = config
            .sensitive_names
            .iter()
            .map(|p| {
                Pattern::new(&p.to_lowercase()).map_err(|e| MaskerError::NamePattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let values = config
            .value_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| MaskerError::ValuePattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            names,
            values,
            secrets: HashSet::new(),
        })
    }

    /// Register a literal secret; every occurrence of it is masked
    pub fn add_secret(&mut self, secret: impl Into<String>) {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.insert(secret);
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.add_secret(secret);
        self
    }
}

impl SecretsMasker for PatternMasker {
    fn is_sensitive_name(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.names.iter().any(|p| p.matches(&name))
    }

    fn is_sensitive_value(&self, value: &str) -> bool {
        self.secrets.iter().any(|secret| value.contains(secret.as_str()))
            || self.values.iter().any(|r| r.is_match(value))
    }

    /// Pattern matches mask the whole string. Registered secrets are
    /// replaced where they occur, longest first.
    fn mask_value(&self, value: &str) -> Option<String> {
        if self.values.iter().any(|r| r.is_match(value)) {
            return Some(MASK.to_string());
        }

        let mut secrets: Vec<&String> = self
            .secrets
            .iter()
            .filter(|secret| value.contains(secret.as_str()))
            .collect();
        if secrets.is_empty() {
            return None;
        }
        secrets.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut masked = value.to_string();
        for secret in secrets {
            masked = masked.replace(secret.as_str(), MASK);
        }
        Some(masked)
    }
}

/// Masks sensitive data in events
#[derive(Clone)]
pub struct Redactor {
    masker: Arc<dyn SecretsMasker>,
}

impl std::fmt::Debug for Redactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redactor").finish_non_exhaustive()
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(Arc::new(PatternMasker::new(&MaskerConfig::default()).unwrap_or_default()))
    }
}

impl Redactor {
    pub fn new(masker: Arc<dyn SecretsMasker>) -> Self {
        Self { masker }
    }

    /// Return a redacted copy of `event`. The input is left untouched.
    pub fn redact(&self, event: &Event, max_depth: usize) -> Event {
        Event {
            event_type: event.event_type,
            event_time: event.event_time,
            producer: self.redact_str(&event.producer),
            run: Run {
                run_id: self.redact_str(&event.run.run_id),
                facets: self.redact_facets(&event.run.facets, 1, max_depth),
            },
            job: Job {
                namespace: self.redact_str(&event.job.namespace),
                name: self.redact_str(&event.job.name),
                kind: event.job.kind,
                facets: self.redact_facets(&event.job.facets, 1, max_depth),
            },
            inputs: self.redact_datasets(&event.inputs, max_depth),
            outputs: self.redact_datasets(&event.outputs, max_depth),
        }
    }

    /// Redact a bare payload tree rooted at depth 0
    pub fn redact_value(&self, value: &Value, max_depth: usize) -> Value {
        self.walk(value, false, 0, max_depth)
    }

    /// Identifier fields are plain strings; only value checks apply
    fn redact_str(&self, value: &str) -> String {
        self.masker
            .mask_value(value)
            .unwrap_or_else(|| value.to_string())
    }

    fn redact_datasets(&self, datasets: &[Dataset], max_depth: usize) -> Vec<Dataset> {
        datasets
            .iter()
            .map(|dataset| Dataset {
                namespace: self.redact_str(&dataset.namespace),
                name: self.redact_str(&dataset.name),
                facets: self.redact_facets(&dataset.facets, 1, max_depth),
            })
            .collect()
    }

    fn redact_facets(&self, facets: &FacetMap, owner_depth: usize, max_depth: usize) -> FacetMap {
        facets
            .iter()
            .map(|(name, facet)| {
                let redacted = if owner_depth > max_depth {
                    truncated()
                } else {
                    self.redact_facet(name, facet, owner_depth + 1, max_depth)
                };
                (name.clone(), redacted)
            })
            .collect()
    }

    fn redact_facet(&self, name: &str, facet: &Facet, depth: usize, max_depth: usize) -> Facet {
        if depth > max_depth {
            return truncated();
        }

        // A facet that cannot be rendered is dropped to the mask rather
        // than sent as-is.
        let payload = match facet.to_payload() {
            Ok(payload) => payload,
            Err(_) => return Facet::Custom(Value::String(MASK.to_string())),
        };

        let sensitive = self.masker.is_sensitive_name(name);
        let redacted = self.walk(&payload, sensitive, depth, max_depth);

        if redacted == payload {
            facet.clone()
        } else {
            facet.with_payload(redacted)
        }
    }

    fn walk(&self, value: &Value, sensitive: bool, depth: usize, max_depth: usize) -> Value {
        if depth > max_depth {
            return Value::String(DEPTH_MARKER.to_string());
        }

        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, child)| {
                        let sensitive = sensitive || self.masker.is_sensitive_name(key);
                        (key.clone(), self.walk(child, sensitive, depth + 1, max_depth))
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|child| self.walk(child, sensitive, depth + 1, max_depth))
                    .collect(),
            ),
            Value::String(_) | Value::Number(_) if sensitive => Value::String(MASK.to_string()),
            Value::String(s) => match self.masker.mask_value(s) {
                Some(masked) => Value::String(masked),
                None => Value::String(s.clone()),
            },
            other => other.clone(),
        }
    }
}

fn truncated() -> Facet {
    Facet::Custom(Value::String(DEPTH_MARKER.to_string()))
}
