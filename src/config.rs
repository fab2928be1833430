//! Configuration for lineage emission.
//!
//! Transport configuration sources (first non-empty wins):
//! 1. YAML file named by `LineageSettings::config_path` (LINEAGE_CONFIG_PATH)
//! 2. Structured transport settings (LINEAGE_TRANSPORT, a JSON object)
//! 3. Default discovery: OPENLINEAGE_CONFIG, then `openlineage.yml` in the
//!    current directory or its parents, then `~/.openlineage/openlineage.yml`,
//!    then the console transport
//!
//! The client built from the resolved configuration is cached for the life
//! of the resolver; changed configuration needs a restart.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::adapters::{LineageClient, TransportRegistry};
use crate::core::redaction::MaskerConfig;
use crate::domain::ProcessingEngineFacet;
use crate::error::{LineageError, Result};

/// Default config file name used by discovery
pub const CONFIG_FILE_NAME: &str = "openlineage.yml";

/// Client config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub transport: Option<TransportConfig>,
}

impl ClientConfig {
    pub fn with_transport(transport: TransportConfig) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transport.is_none()
    }

    /// Transport type for logging
    pub fn transport_type(&self) -> &str {
        self.transport
            .as_ref()
            .map(|t| t.kind.as_str())
            .unwrap_or("no type provided")
    }
}

/// A `transport` block: the `type` discriminator plus transport options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl TransportConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            options: Map::new(),
        }
    }
}

/// Settings threaded into the emitter at construction time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageSettings {
    /// Namespace that scopes job names (default: "default")
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Producer URI stamped on every event
    #[serde(default = "default_producer")]
    pub producer: String,

    /// Integration name in the job type facet (default: "AIRFLOW")
    #[serde(default = "default_integration")]
    pub integration: String,

    /// Name of the host workflow engine
    #[serde(default = "default_engine_name")]
    pub engine_name: String,

    /// Version of the host workflow engine
    #[serde(default)]
    pub engine_version: String,

    /// Path to a YAML client config file
    #[serde(default)]
    pub config_path: Option<PathBuf>,

    /// Inline transport configuration
    #[serde(default)]
    pub transport: Option<TransportConfig>,

    /// Send every event to the noop transport
    #[serde(default)]
    pub disabled: bool,

    /// Redaction patterns
    #[serde(default)]
    pub masker: MaskerConfig,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_producer() -> String {
    format!(
        "https://github.com/lineage-relay/lineage-relay/tree/{}",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_integration() -> String {
    "AIRFLOW".to_string()
}

fn default_engine_name() -> String {
    "Airflow".to_string()
}

impl Default for LineageSettings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            producer: default_producer(),
            integration: default_integration(),
            engine_name: default_engine_name(),
            engine_version: String::new(),
            config_path: None,
            transport: None,
            disabled: false,
            masker: MaskerConfig::default(),
        }
    }
}

impl LineageSettings {
    /// Read settings from LINEAGE_* environment variables
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();

        if let Some(namespace) = env_var("LINEAGE_NAMESPACE") {
            settings.namespace = namespace;
        }
        if let Some(producer) = env_var("LINEAGE_PRODUCER") {
            settings.producer = producer;
        }
        if let Some(integration) = env_var("LINEAGE_INTEGRATION") {
            settings.integration = integration;
        }
        if let Some(engine_version) = env_var("LINEAGE_ENGINE_VERSION") {
            settings.engine_version = engine_version;
        }
        settings.config_path = env_var("LINEAGE_CONFIG_PATH").map(PathBuf::from);

        if let Some(raw) = env_var("LINEAGE_TRANSPORT") {
            settings.transport = Some(parse_transport(&raw)?);
        }
        if let Some(disabled) = env_var("LINEAGE_DISABLED") {
            settings.disabled = matches!(disabled.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(settings)
    }

    /// Descriptor of the host engine for the processing engine facet
    pub fn processing_engine(&self) -> ProcessingEngineFacet {
        ProcessingEngineFacet {
            name: self.engine_name.clone(),
            version: self.engine_version.clone(),
            openlineage_adapter_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a JSON transport block, e.g. `{"type": "console"}`
pub fn parse_transport(raw: &str) -> Result<TransportConfig> {
    serde_json::from_str(raw)
        .map_err(|e| LineageError::Settings(format!("LINEAGE_TRANSPORT is not a transport block: {}", e)))
}

/// Load and parse a YAML client config file. An empty file yields an
/// empty configuration.
pub fn load_config_file(path: &Path) -> Result<ClientConfig> {
    read_config_file(path).map_err(|e| LineageError::Config {
        path: path.to_path_buf(),
        message: format!("{:#}", e),
    })
}

fn read_config_file(path: &Path) -> anyhow::Result<ClientConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(ClientConfig::default());
    }

    let config: Option<ClientConfig> = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config.unwrap_or_default())
}

/// Find a client config file the way transports discover one on their own
fn find_default_config_file() -> Option<PathBuf> {
    if let Some(path) = env_var("OPENLINEAGE_CONFIG") {
        return Some(PathBuf::from(path));
    }

    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                break;
            }
        }
    }

    dirs::home_dir()
        .map(|home| home.join(".openlineage").join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

/// Locates transport configuration and builds the client once
#[derive(Debug)]
pub struct ConfigResolver {
    settings: LineageSettings,
    registry: TransportRegistry,
    client: OnceLock<Arc<LineageClient>>,
}

impl ConfigResolver {
    pub fn new(settings: LineageSettings, registry: TransportRegistry) -> Self {
        Self {
            settings,
            registry,
            client: OnceLock::new(),
        }
    }

    /// Resolver with an already constructed client
    pub fn with_client(settings: LineageSettings, client: LineageClient) -> Self {
        let resolver = Self::new(settings, TransportRegistry::with_builtins());
        let _ = resolver.client.set(Arc::new(client));
        resolver
    }

    pub fn settings(&self) -> &LineageSettings {
        &self.settings
    }

    /// Whether the client has been constructed yet
    pub fn is_initialized(&self) -> bool {
        self.client.get().is_some()
    }

    /// Return the cached client, constructing it on first use.
    ///
    /// Concurrent first calls may each build a client; one is kept and the
    /// others are dropped.
    pub fn get_client(&self) -> Result<Arc<LineageClient>> {
        if let Some(client) = self.client.get() {
            return Ok(Arc::clone(client));
        }

        let config = self.resolve_config()?;
        debug!(
            transport = config.transport_type(),
            "Lineage configuration resolved"
        );
        let client = Arc::new(self.registry.build(&config)?);

        Ok(Arc::clone(self.client.get_or_init(|| client)))
    }

    /// Resolve the client configuration from the configured sources
    pub fn resolve_config(&self) -> Result<ClientConfig> {
        if self.settings.disabled {
            debug!("Lineage emission disabled, using noop transport");
            return Ok(ClientConfig::with_transport(TransportConfig::new("noop")));
        }

        if let Some(ref path) = self.settings.config_path {
            let config = load_config_file(path)?;
            if !config.is_empty() {
                return Ok(config);
            }
            debug!(path = %path.display(), "Lineage config file has no transport");
        } else {
            debug!("Lineage config_path not set");
        }

        if let Some(ref transport) = self.settings.transport {
            return Ok(ClientConfig::with_transport(transport.clone()));
        }
        debug!("Lineage transport settings not found, falling back to default discovery");

        match find_default_config_file() {
            Some(path) => load_config_file(&path),
            None => Ok(ClientConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", body).unwrap();
        path
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
transport:
  type: http
  url: http://marquez:5000
  timeout: 5
"#,
        );

        let config = load_config_file(&path).unwrap();
        let transport = config.transport.unwrap();
        assert_eq!(transport.kind, "http");
        assert_eq!(
            transport.options.get("url"),
            Some(&Value::String("http://marquez:5000".to_string()))
        );
        assert_eq!(transport.options.get("timeout"), Some(&Value::from(5)));
    }

    #[test]
    fn test_empty_config_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "");

        assert!(load_config_file(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_config_file_is_fatal() {
        let result = load_config_file(Path::new("/nonexistent/openlineage.yml"));
        assert!(matches!(result, Err(LineageError::Config { .. })));
    }

    #[test]
    fn test_unparseable_config_file_is_fatal() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "transport: [not, a, mapping");

        assert!(matches!(load_config_file(&path), Err(LineageError::Config { .. })));
    }

    #[test]
    fn test_file_takes_precedence_over_transport_settings() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "transport:\n  type: noop\n");

        let settings = LineageSettings {
            config_path: Some(path),
            transport: Some(TransportConfig::new("console")),
            ..Default::default()
        };
        let resolver = ConfigResolver::new(settings, TransportRegistry::with_builtins());

        assert_eq!(resolver.resolve_config().unwrap().transport_type(), "noop");
    }

    #[test]
    fn test_empty_file_falls_through_to_transport_settings() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "");

        let settings = LineageSettings {
            config_path: Some(path),
            transport: Some(TransportConfig::new("noop")),
            ..Default::default()
        };
        let resolver = ConfigResolver::new(settings, TransportRegistry::with_builtins());

        assert_eq!(resolver.resolve_config().unwrap().transport_type(), "noop");
    }

    #[test]
    fn test_disabled_uses_noop() {
        let settings = LineageSettings {
            disabled: true,
            transport: Some(TransportConfig::new("console")),
            ..Default::default()
        };
        let resolver = ConfigResolver::new(settings, TransportRegistry::with_builtins());

        assert_eq!(resolver.get_client().unwrap().transport_kind(), "noop");
    }

    #[test]
    fn test_client_is_memoized() {
        let settings = LineageSettings {
            transport: Some(TransportConfig::new("noop")),
            ..Default::default()
        };
        let resolver = ConfigResolver::new(settings, TransportRegistry::with_builtins());
        assert!(!resolver.is_initialized());

        let first = resolver.get_client().unwrap();
        let second = resolver.get_client().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(resolver.is_initialized());
    }

    #[test]
    fn test_parse_transport_json() {
        let transport = parse_transport(r#"{"type": "console", "pretty": true}"#).unwrap();
        assert_eq!(transport.kind, "console");
        assert_eq!(transport.options.get("pretty"), Some(&Value::Bool(true)));

        assert!(matches!(parse_transport("nope"), Err(LineageError::Settings(_))));
    }

    #[test]
    fn test_settings_defaults_from_yaml() {
        let settings: LineageSettings = serde_yaml::from_str("namespace: prod\n").unwrap();
        assert_eq!(settings.namespace, "prod");
        assert_eq!(settings.integration, "AIRFLOW");
        assert!(!settings.disabled);
        assert!(settings.producer.contains(env!("CARGO_PKG_VERSION")));
    }
}
