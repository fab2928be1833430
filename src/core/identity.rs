//! Deterministic run identifiers.
//!
//! Run ids are derived, never random: emitting the same lifecycle
//! transition twice (for instance after a crash and retry) yields the same
//! id, so consumers can correlate duplicate events.
//!
//! Ids are UUIDv7-shaped. The timestamp bits hold the logical time in Unix
//! milliseconds; the remaining bits come from a SHA-256 digest of the seed
//! data.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::{Builder, Uuid};

/// Derive the run id of a workflow run
pub fn derive_run_id(namespace: &str, workflow_id: &str, logical_time: DateTime<Utc>) -> Uuid {
    derive_cleared_run_id(namespace, workflow_id, logical_time, 0)
}

/// Derive the run id of a workflow run that has been cleared `clear_number`
/// times. Clearing re-runs the workflow for the same logical time, so it
/// has to produce a distinct identity.
pub fn derive_cleared_run_id(
    namespace: &str,
    workflow_id: &str,
    logical_time: DateTime<Utc>,
    clear_number: u32,
) -> Uuid {
    let seed = format!("{}.{}.{}", namespace, workflow_id, clear_number);
    static_uuid(logical_time, seed.as_bytes())
}

/// Derive the run id of a single task attempt
pub fn derive_task_run_id(
    namespace: &str,
    workflow_id: &str,
    task_id: &str,
    attempt_number: u32,
    logical_time: DateTime<Utc>,
    map_index: i32,
) -> Uuid {
    let seed = format!(
        "{}.{}.{}.{}.{}",
        namespace, workflow_id, task_id, attempt_number, map_index
    );
    static_uuid(logical_time, seed.as_bytes())
}

fn static_uuid(instant: DateTime<Utc>, data: &[u8]) -> Uuid {
    let instant_millis = instant.timestamp_millis();

    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.update(instant_millis.to_be_bytes());
    let digest = hasher.finalize();

    let mut random_bytes = [0u8; 10];
    random_bytes.copy_from_slice(&digest[..10]);

    // The timestamp field cannot hold pre-epoch times
    let millis = instant_millis.max(0) as u64;
    Builder::from_unix_timestamp_millis(millis, &random_bytes).into_uuid()
}
