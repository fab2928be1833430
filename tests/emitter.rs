//! Emitter Integration Tests
//!
//! Tests for lifecycle calls, dispatch failure isolation and logging.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread;

use lineage_relay::core::metrics::names;
use lineage_relay::core::SecretsMasker;
use lineage_relay::domain::facets::{JOB_TYPE, PROCESSING_ENGINE};
use lineage_relay::{
    ConfigResolver, DagEnd, DagStart, Event, EventType, Facet, FacetMap, LineageClient,
    LineageEmitter, LineageSettings, TaskEnd, TaskFailure, TaskLineageMetadata, TaskStart,
    Transport, TransportConfig, TransportRegistry,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::json;

/// Transport whose every dispatch fails
struct FailingTransport;

impl Transport for FailingTransport {
    fn kind(&self) -> &str {
        "HTTP"
    }

    fn emit(&self, _event: &Event) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }
}

/// Transport that panics on dispatch
struct PanickingTransport;

impl Transport for PanickingTransport {
    fn kind(&self) -> &str {
        "kafka"
    }

    fn emit(&self, _event: &Event) -> anyhow::Result<()> {
        panic!("broker exploded")
    }
}

/// Shared in-memory sink for captured log output
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.contents())
}

/// Metrics recorded while running `f`, as (name, counter value or sample count)
fn with_recorded_metrics<T>(f: impl FnOnce() -> T) -> (T, Vec<(String, u64)>) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let result = metrics::with_local_recorder(&recorder, f);

    let mut recorded: Vec<(String, u64)> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(key, _, _, value)| {
            let value = match value {
                DebugValue::Counter(count) => count,
                DebugValue::Histogram(samples) => samples.len() as u64,
                DebugValue::Gauge(_) => panic!("No gauges are reported"),
            };
            (key.key().name().to_string(), value)
        })
        .collect();
    recorded.sort();
    (result, recorded)
}

fn metric(recorded: &[(String, u64)], name: &str) -> u64 {
    recorded
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| *v)
        .unwrap_or(0)
}

fn emitter_with(transport: Box<dyn Transport>) -> LineageEmitter {
    let resolver = ConfigResolver::with_client(LineageSettings::default(), LineageClient::new(transport));
    LineageEmitter::from_resolver(resolver).unwrap()
}

fn noop_emitter() -> LineageEmitter {
    let settings = LineageSettings {
        transport: Some(TransportConfig::new("noop")),
        ..Default::default()
    };
    LineageEmitter::new(settings, TransportRegistry::with_builtins()).unwrap()
}

fn task_start() -> TaskStart {
    TaskStart {
        run_id: "r1".to_string(),
        job_name: "dag.task".to_string(),
        job_description: Some("moves rows".to_string()),
        event_time: "2024-01-01T00:00:00Z".to_string(),
        owners: Some(vec!["b".to_string(), "a".to_string()]),
        ..Default::default()
    }
}

fn dag_end(end_date: &str) -> DagEnd {
    DagEnd {
        dag_id: "etl".to_string(),
        end_date: end_date.to_string(),
        logical_date: "2024-01-01T00:00:00Z".to_string(),
        run_state: "failed".to_string(),
        task_ids: vec!["load".to_string()],
        ..Default::default()
    }
}

#[test]
fn test_start_task_without_task_metadata() {
    let emitter = noop_emitter();
    let event = emitter.start_task(task_start()).unwrap();

    assert!(event.inputs.is_empty());
    assert!(event.outputs.is_empty());
    assert_eq!(event.run.run_id, "r1");
    assert_eq!(event.run.facets.keys().collect::<Vec<_>>(), vec![PROCESSING_ENGINE]);

    let job = serde_json::to_value(&event.job).unwrap();
    assert_eq!(job["facets"]["ownership"]["owners"], json!([{"name": "a"}, {"name": "b"}]));
    assert_eq!(job["facets"]["jobType"]["jobType"], "TASK");
    assert_eq!(job["namespace"], "default");
}

#[test]
fn test_complete_task_uses_task_datasets() {
    let emitter = noop_emitter();
    let mut task = TaskLineageMetadata::default();
    task.inputs.push(lineage_relay::Dataset::new("s3://lake", "raw/orders"));
    task.outputs.push(lineage_relay::Dataset::new("s3://lake", "clean/orders"));
    task.job_facets
        .insert(JOB_TYPE.to_string(), Facet::Custom(json!({"jobType": "QUERY"})));

    let event = emitter
        .complete_task(TaskEnd {
            run_id: "r1".to_string(),
            job_name: "dag.task".to_string(),
            end_time: "2024-01-01T00:10:00Z".to_string(),
            task: Some(task),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(event.event_type, EventType::Complete);
    assert_eq!(event.inputs[0].name, "raw/orders");
    assert_eq!(event.outputs[0].name, "clean/orders");
    assert_eq!(
        event.job.facets.get(JOB_TYPE),
        Some(&emitter.composer().job_type_facet(lineage_relay::JobKind::Task))
    );
}

#[test]
fn test_dispatch_failure_is_isolated() {
    let emitter = emitter_with(Box::new(FailingTransport));
    let mut run_facets = FacetMap::new();
    run_facets.insert("auth".to_string(), Facet::Custom(json!({"token": "t0k3n"})));

    let ((result, recorded), logs) = with_captured_logs(|| {
        with_recorded_metrics(|| {
            emitter.fail_task(
                TaskEnd {
                    run_id: "r1".to_string(),
                    job_name: "dag.task".to_string(),
                    end_time: "2024-01-01T00:10:00Z".to_string(),
                    run_facets,
                    ..Default::default()
                },
                Some(TaskFailure::from("bad row")),
            )
        })
    });

    let event = result.expect("dispatch failure must not be returned");
    assert_eq!(
        event.run.facets.get("auth"),
        Some(&Facet::Custom(json!({"token": "***"})))
    );
    assert_eq!(metric(&recorded, names::EMIT_FAILED), 1);
    assert_eq!(metric(&recorded, &names::emit_attempts_for("fail", "http")), 1);
    assert!(logs.contains("WARN"));
    assert!(logs.contains("Failed to emit lineage event"));
    assert!(logs.contains("connection refused"));
}

#[test]
fn test_transport_panic_is_isolated() {
    let emitter = emitter_with(Box::new(PanickingTransport));

    let (event, recorded) = with_recorded_metrics(|| emitter.start_task(task_start()).unwrap());
    assert_eq!(event.run.run_id, "r1");
    assert_eq!(metric(&recorded, names::EMIT_FAILED), 1);
    assert_eq!(metric(&recorded, names::EMIT_ATTEMPTS), 1);
}

#[test]
fn test_dag_failed_with_malformed_input_is_suppressed() {
    let emitter = noop_emitter();

    let ((result, recorded), logs) = with_captured_logs(|| {
        with_recorded_metrics(|| emitter.dag_failed(dag_end("not-a-timestamp"), "task failed"))
    });

    assert!(result.is_none());
    assert!(logs.contains("WARN"));
    assert!(logs.contains("Failed to emit lineage DAG failed event"));
    assert!(recorded.is_empty());
}

#[test]
fn test_dag_calls_suppress_configuration_errors() {
    let settings = LineageSettings {
        config_path: Some("/nonexistent/openlineage.yml".into()),
        ..Default::default()
    };
    let emitter = LineageEmitter::new(settings, TransportRegistry::with_builtins()).unwrap();

    let event = emitter.dag_started(DagStart {
        dag_id: "etl".to_string(),
        logical_date: "2024-01-01T00:00:00Z".to_string(),
        start_date: "2024-01-01T00:00:00Z".to_string(),
        ..Default::default()
    });
    assert!(event.is_none());

    // Task-level calls surface the configuration error
    assert!(emitter.start_task(task_start()).is_err());
}

#[test]
fn test_dag_success_and_failed_share_run_id() {
    let emitter = noop_emitter();

    let success = emitter.dag_success(dag_end("2024-01-01T01:00:00Z")).unwrap();
    let failed = emitter
        .dag_failed(dag_end("2024-01-01T01:00:00Z"), "load failed")
        .unwrap();

    assert_eq!(success.run.run_id, failed.run.run_id);
    assert_eq!(success.event_type, EventType::Complete);
    assert_eq!(failed.event_type, EventType::Fail);
    assert_eq!(
        serde_json::to_value(&failed.run).unwrap()["facets"]["errorMessage"]["message"],
        "load failed"
    );
}

#[test]
fn test_emitter_is_shared_across_threads() {
    let emitter = Arc::new(noop_emitter());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let emitter = Arc::clone(&emitter);
            thread::spawn(move || {
                emitter
                    .start_task(TaskStart {
                        run_id: format!("r{}", i),
                        ..task_start()
                    })
                    .unwrap()
            })
        })
        .collect();

    let mut run_ids: Vec<String> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().run.run_id)
        .collect();
    run_ids.sort();
    run_ids.dedup();
    assert_eq!(run_ids.len(), 8);
}

#[test]
fn test_dag_call_panic_is_logged_with_backtrace() {
    struct BrokenMasker;

    impl SecretsMasker for BrokenMasker {
        fn is_sensitive_name(&self, _name: &str) -> bool {
            panic!("masker broke")
        }

        fn is_sensitive_value(&self, _value: &str) -> bool {
            false
        }
    }

    let emitter = noop_emitter().with_masker(Arc::new(BrokenMasker));

    let (result, logs) = with_captured_logs(|| {
        emitter.dag_started(DagStart {
            dag_id: "etl".to_string(),
            logical_date: "2024-01-01T00:00:00Z".to_string(),
            start_date: "2024-01-01T00:05:00Z".to_string(),
            ..Default::default()
        })
    });

    assert!(result.is_none());
    assert!(logs.contains("Failed to emit lineage DAG started event"));
    assert!(logs.contains("masker broke"));
    assert!(logs.contains("backtrace="));
}

#[test]
fn test_host_supplied_debug_facet_is_carried() {
    let emitter = noop_emitter();
    let mut run_facets = FacetMap::new();
    run_facets.insert(
        "debug".to_string(),
        Facet::Custom(json!({"packages": {"apache-airflow": "2.10.0"}})),
    );

    let event = emitter
        .dag_started(DagStart {
            dag_id: "etl".to_string(),
            logical_date: "2024-01-01T00:00:00Z".to_string(),
            start_date: "2024-01-01T00:05:00Z".to_string(),
            run_facets,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(
        event.run.facets.get("debug"),
        Some(&Facet::Custom(json!({"packages": {"apache-airflow": "2.10.0"}})))
    );
    assert!(event.run.facets.contains_key(PROCESSING_ENGINE));
}
