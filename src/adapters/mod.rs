//! Transport interfaces for delivering lineage events.
//!
//! Transports provide a unified interface for the sinks events are sent to.
//! Wire transports (HTTP, Kafka, files) live with the host and are plugged
//! in through [`TransportRegistry::register`].

pub mod console;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::config::{ClientConfig, TransportConfig};
use crate::domain::Event;
use crate::error::LineageError;

// Re-export the console transport
pub use console::ConsoleTransport;

/// Trait for event sinks
pub trait Transport: Send + Sync {
    /// Transport kind, used to label metrics (e.g. "console")
    fn kind(&self) -> &str;

    /// Deliver one event. A single best-effort attempt.
    fn emit(&self, event: &Event) -> Result<()>;
}

/// Accepts and drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransport;

impl Transport for NoopTransport {
    fn kind(&self) -> &str {
        "noop"
    }

    fn emit(&self, _event: &Event) -> Result<()> {
        Ok(())
    }
}

/// Builds a transport from its configuration block
pub type TransportFactory = Arc<dyn Fn(&TransportConfig) -> Result<Box<dyn Transport>> + Send + Sync>;

/// Maps `transport.type` discriminators to factories
#[derive(Clone)]
pub struct TransportRegistry {
    factories: HashMap<String, TransportFactory>,
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("TransportRegistry").field("kinds", &kinds).finish()
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TransportRegistry {
    /// Registry without any transports
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the `console` and `noop` transports
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("console", |config| {
            Ok(Box::new(ConsoleTransport::from_config(config)) as Box<dyn Transport>)
        });
        registry.register("noop", |_| Ok(Box::new(NoopTransport) as Box<dyn Transport>));
        registry
    }

    /// Register (or replace) the factory for a transport type
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&TransportConfig) -> Result<Box<dyn Transport>> + Send + Sync + 'static,
    {
        self.factories
            .insert(kind.into().to_lowercase(), Arc::new(factory));
    }

    /// Construct a client for the given configuration.
    ///
    /// A configuration without a `transport` block gets the console transport.
    pub fn build(&self, config: &ClientConfig) -> Result<LineageClient, LineageError> {
        let transport_config = config
            .transport
            .clone()
            .unwrap_or_else(|| TransportConfig::new("console"));
        let kind = transport_config.kind.to_lowercase();

        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| LineageError::UnknownTransport(transport_config.kind.clone()))?;

        debug!(transport = %kind, "Constructing lineage transport");
        let transport = factory(&transport_config)?;
        Ok(LineageClient::new(transport))
    }
}

/// Client wrapping the configured transport
pub struct LineageClient {
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for LineageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineageClient")
            .field("transport", &self.transport.kind())
            .finish()
    }
}

impl LineageClient {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Lowercase transport kind for metric labels
    pub fn transport_kind(&self) -> String {
        self.transport.kind().to_lowercase()
    }

    pub fn emit(&self, event: &Event) -> Result<()> {
        self.transport.emit(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_transports() {
        let registry = TransportRegistry::with_builtins();

        let client = registry
            .build(&ClientConfig::with_transport(TransportConfig::new("noop")))
            .unwrap();
        assert_eq!(client.transport_kind(), "noop");

        let client = registry.build(&ClientConfig::default()).unwrap();
        assert_eq!(client.transport_kind(), "console");
    }

    #[test]
    fn test_discriminator_is_case_insensitive() {
        let registry = TransportRegistry::with_builtins();
        let client = registry
            .build(&ClientConfig::with_transport(TransportConfig::new("Console")))
            .unwrap();
        assert_eq!(client.transport_kind(), "console");
    }

    #[test]
    fn test_unknown_transport() {
        let registry = TransportRegistry::with_builtins();
        let result = registry.build(&ClientConfig::with_transport(TransportConfig::new("kafka")));
        assert!(matches!(result, Err(LineageError::UnknownTransport(kind)) if kind == "kafka"));
    }

    #[test]
    fn test_registered_factory_failure_is_reported() {
        let mut registry = TransportRegistry::empty();
        registry.register("http", |_| anyhow::bail!("missing url"));

        let result = registry.build(&ClientConfig::with_transport(TransportConfig::new("http")));
        assert!(matches!(result, Err(LineageError::Transport(_))));
    }
}
