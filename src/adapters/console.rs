//! Console transport: writes each event as JSON through `tracing`.
//!
//! This is the fallback when no transport is configured anywhere.

use anyhow::{Context, Result};
use tracing::info;

use super::Transport;
use crate::config::TransportConfig;
use crate::domain::Event;

/// Logs events at `info` under the `lineage::console` target
#[derive(Debug, Default, Clone)]
pub struct ConsoleTransport {
    /// Pretty-print the JSON payload
    pretty: bool,
}

impl ConsoleTransport {
    /// Reads the optional boolean `pretty` option
    pub fn from_config(config: &TransportConfig) -> Self {
        let pretty = config
            .options
            .get("pretty")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Self { pretty }
    }

    fn render(&self, event: &Event) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(event)
        } else {
            serde_json::to_string(event)
        };
        json.context("Failed to serialize lineage event")
    }
}

impl Transport for ConsoleTransport {
    fn kind(&self) -> &str {
        "console"
    }

    fn emit(&self, event: &Event) -> Result<()> {
        let json = self.render(event)?;
        info!(target: "lineage::console", run_id = %event.run.run_id, "{}", json);
        Ok(())
    }
}
