//! Command-line interface for lineage-relay.
//!
//! Provides commands for deriving run identifiers, inspecting the resolved
//! transport configuration and sending a test event.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::adapters::TransportRegistry;
use crate::config::{ConfigResolver, LineageSettings};
use crate::core::{
    derive_cleared_run_id, derive_task_run_id, parse_timestamp, DagStart, LineageEmitter,
};

/// lineage-relay - Lineage events for workflow engines
#[derive(Parser, Debug)]
#[command(name = "lineage-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Namespace (overrides LINEAGE_NAMESPACE)
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive the run id of a workflow run or task attempt
    RunId {
        /// Workflow (DAG) id
        dag_id: String,

        /// Logical date (RFC 3339)
        #[arg(short, long)]
        logical_date: String,

        /// Task id; derives a task run id when set
        #[arg(short, long)]
        task_id: Option<String>,

        /// Task attempt number
        #[arg(long, default_value = "1")]
        try_number: u32,

        /// Map index of a mapped task (-1 when not mapped)
        #[arg(long, default_value = "-1", allow_negative_numbers = true)]
        map_index: i32,

        /// Number of times the workflow run was cleared
        #[arg(long, default_value = "0")]
        clear_number: u32,
    },

    /// Show resolved transport configuration (debug)
    Config,

    /// Emit a test START event for a workflow through the configured transport
    EmitTest {
        /// Workflow (DAG) id to report
        #[arg(default_value = "lineage_relay_test")]
        dag_id: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let mut settings = LineageSettings::from_env()?;
        if let Some(namespace) = self.namespace {
            settings.namespace = namespace;
        }

        match self.command {
            Commands::RunId {
                dag_id,
                logical_date,
                task_id,
                try_number,
                map_index,
                clear_number,
            } => {
                let logical_date = parse_timestamp(&logical_date)?;
                let run_id = match task_id {
                    Some(task_id) => derive_task_run_id(
                        &settings.namespace,
                        &dag_id,
                        &task_id,
                        try_number,
                        logical_date,
                        map_index,
                    ),
                    None => derive_cleared_run_id(
                        &settings.namespace,
                        &dag_id,
                        logical_date,
                        clear_number,
                    ),
                };
                println!("{}", run_id);
            }

            Commands::Config => {
                println!("Namespace: {}", settings.namespace);
                println!("Producer:  {}", settings.producer);
                if let Some(ref path) = settings.config_path {
                    println!("Config:    {}", path.display());
                }

                let resolver = ConfigResolver::new(settings, TransportRegistry::with_builtins());
                let config = resolver.resolve_config()?;
                let yaml =
                    serde_yaml::to_string(&config).context("Failed to render configuration")?;
                println!();
                print!("{}", yaml);
            }

            Commands::EmitTest { dag_id } => {
                let emitter = LineageEmitter::new(settings, TransportRegistry::with_builtins())?;

                let now = Utc::now().to_rfc3339();
                let event = emitter.dag_started(DagStart {
                    dag_id: dag_id.clone(),
                    logical_date: now.clone(),
                    start_date: now,
                    description: Some("lineage-relay test event".to_string()),
                    ..Default::default()
                });

                match event {
                    Some(event) => println!("Emitted START for '{}' (run {})", dag_id, event.run.run_id),
                    None => anyhow::bail!("Failed to emit test event for '{}'", dag_id),
                }
            }
        }

        Ok(())
    }
}
