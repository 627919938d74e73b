//! Configuration file loading and resource resolution
//!
//! One TOML file describes the backend and the desired resources:
//!
//! ```toml
//! [backend]
//! kind = "http"
//! endpoint = "https://management.example.com"
//! api_version = "2022-08-01"
//! token_env = "CONVERGE_TOKEN"
//!
//! [defaults]
//! subscription = "00000000-0000-0000-0000-000000000000"
//! resource_group = "rg-apis"
//! service = "contoso-gw"
//!
//! [[resources]]
//! kind = "api"
//! name = "petstore"
//! fields = { display_name = "Pet Store", path = "pets", protocols = "https" }
//!
//! [[resources]]
//! kind = "api_policy"
//! scope = { api = "petstore" }
//! fields = { xml_content = { file = "policies/petstore.xml" } }
//! ```

use anyhow::{Context, Result, bail};
use gateway::{FileGateway, HttpConfig, HttpGateway, RetryConfig, RetryingGateway};
use reconcile::{
    BackendGateway, FieldKind, FieldValue, Fields, ReadAfterWrite, ResourceKind, ResourceRecord,
    catalog,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path (~/.config/converge)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("converge"))
}

/// Get the default config file path
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Expand `~` and environment variables in a configured path
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .with_context(|| format!("Could not expand path: {path}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

// ============================================================================
// Config Structures
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub engine: EngineSettings,

    /// Ledger file; defaults to ~/.local/state/converge/ledger.toml
    #[serde(default)]
    pub ledger: Option<String>,

    /// Scope values shared by every resource, keyed by segment kind
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,

    #[serde(default)]
    pub resources: Vec<ResourceConfig>,

    /// Directory relative file references resolve against
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Http,
    #[default]
    File,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    /// Control plane base URL (http backend)
    pub endpoint: Option<String>,

    /// `api-version` query parameter (http backend)
    pub api_version: Option<String>,

    /// Environment variable holding the bearer token (http backend)
    pub token_env: Option<String>,

    /// State file path (file backend)
    pub state_file: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            endpoint: None,
            api_version: None,
            token_env: None,
            state_file: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    #[serde(default = "default_raw_attempts")]
    pub read_after_write_attempts: u32,
    #[serde(default = "default_raw_delay_ms")]
    pub read_after_write_delay_ms: u64,
}

fn default_raw_attempts() -> u32 {
    5
}

fn default_raw_delay_ms() -> u64 {
    500
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            read_after_write_attempts: default_raw_attempts(),
            read_after_write_delay_ms: default_raw_delay_ms(),
        }
    }
}

impl EngineSettings {
    pub fn to_read_after_write(&self) -> ReadAfterWrite {
        ReadAfterWrite {
            attempts: self.read_after_write_attempts,
            delay: Duration::from_millis(self.read_after_write_delay_ms),
            ..ReadAfterWrite::default()
        }
    }
}

/// One desired resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    /// Catalog kind name, e.g. `api` or `api_policy`
    pub kind: String,

    /// Leaf value; optional for singleton kinds such as policies
    pub name: Option<String>,

    /// Full identity, instead of `name` + `scope`
    pub id: Option<String>,

    /// Parent segment values overriding `[defaults]`
    #[serde(default)]
    pub scope: BTreeMap<String, String>,

    /// Refuse to adopt a resource this tool has not created
    #[serde(default = "default_import_guard")]
    pub import_guard: bool,

    #[serde(default)]
    pub fields: toml::Table,
}

fn default_import_guard() -> bool {
    true
}

impl ResourceConfig {
    /// Short label for messages: `kind.name` or `kind[index]`
    pub fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => format!("{}.{name}", self.kind),
            None => format!("{}[{index}]", self.kind),
        }
    }
}

/// A configured resource resolved against the catalog
#[derive(Debug, Clone)]
pub struct DesiredResource {
    pub label: String,
    pub kind: &'static ResourceKind,
    pub record: ResourceRecord,
    pub import_guard: bool,
}

impl DesiredResource {
    pub fn handle(&self) -> String {
        self.record.identity().format()
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config: {}", path.display()))?;
        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `path`, or the default location when none is given
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load(&default_config_path()?),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve `path` relative to the config file's directory
    pub fn resolve_path(&self, path: &str) -> Result<PathBuf> {
        let expanded = expand_path(path)?;
        if expanded.is_absolute() {
            Ok(expanded)
        } else {
            Ok(self.base_dir.join(expanded))
        }
    }

    /// Check the backend section and every resource
    pub fn validate(&self) -> Result<()> {
        self.check_backend()?;
        self.desired_resources().map(|_| ())
    }

    fn check_backend(&self) -> Result<()> {
        match self.backend.kind {
            BackendKind::Http => {
                let Some(endpoint) = &self.backend.endpoint else {
                    bail!("backend.endpoint is required for the http backend");
                };
                if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                    bail!("backend.endpoint must be an http(s) URL, got '{endpoint}'");
                }
            }
            BackendKind::File => {
                if self.backend.endpoint.is_some() {
                    log::warn!("backend.endpoint is ignored by the file backend");
                }
            }
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.engine.read_after_write_attempts == 0 {
            bail!("engine.read_after_write_attempts must be at least 1");
        }
        Ok(())
    }

    /// Resolve every `[[resources]]` entry into a validated record
    pub fn desired_resources(&self) -> Result<Vec<DesiredResource>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.resources.len());

        for (index, resource) in self.resources.iter().enumerate() {
            let label = resource.label(index);
            let desired = self
                .resolve(resource, label.clone())
                .with_context(|| format!("resources[{index}] ({label})"))?;
            if !seen.insert(desired.handle()) {
                bail!(
                    "resources[{index}] ({label}): {} is declared more than once",
                    desired.handle()
                );
            }
            resolved.push(desired);
        }

        Ok(resolved)
    }

    fn resolve(&self, resource: &ResourceConfig, label: String) -> Result<DesiredResource> {
        let kind = catalog::require(&resource.kind)?;

        let identity = match &resource.id {
            Some(id) => kind.parse_handle(id)?,
            None => {
                let values = self.segment_values(kind, resource)?;
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                kind.schema.build(&values)?
            }
        };

        let mut fields = Fields::new();
        for (name, value) in &resource.fields {
            let spec = kind
                .field(name)
                .with_context(|| format!("unknown field `{name}` for {}", kind.name))?;
            let value = self
                .field_value(spec.kind, value)
                .with_context(|| format!("field `{name}`"))?;
            fields.insert(name.clone(), value);
        }

        let record = kind.normalize(ResourceRecord::with_fields(identity, fields));
        kind.validate(&record)?;

        Ok(DesiredResource {
            label,
            kind,
            record,
            import_guard: resource.import_guard,
        })
    }

    /// Values for every segment of the kind's identity, root first
    fn segment_values(&self, kind: &ResourceKind, resource: &ResourceConfig) -> Result<Vec<String>> {
        let segments = kind.schema.segments;
        let mut values = Vec::with_capacity(segments.len());

        for (position, segment) in segments.iter().enumerate() {
            let is_leaf = position + 1 == segments.len();
            let value = if is_leaf {
                resource
                    .name
                    .clone()
                    .or_else(|| kind.default_name.map(str::to_string))
            } else {
                lookup_scope(&resource.scope, segment.kind)
                    .or_else(|| lookup_scope(&self.defaults, segment.kind))
            };
            match value {
                Some(value) => values.push(value),
                None if is_leaf => bail!("`name` is required for {}", kind.name),
                None => bail!(
                    "no value for `{}`; set it in `scope` or `[defaults]`",
                    segment.kind
                ),
            }
        }

        Ok(values)
    }

    fn field_value(&self, kind: FieldKind, value: &toml::Value) -> Result<FieldValue> {
        use toml::Value;

        Ok(match value {
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Boolean(b) => FieldValue::Bool(*b),
            Value::Integer(i) => FieldValue::from(*i),
            Value::Float(f) => FieldValue::Number(*f),
            Value::Datetime(d) => FieldValue::String(d.to_string()),
            // arrays travel as their JSON text, the same way backends report them
            Value::Array(_) => FieldValue::String(serde_json::to_string(value)?),
            Value::Table(table) if kind == FieldKind::Document => {
                let Some(Value::String(file)) = table.get("file") else {
                    bail!("document fields take a string or {{ file = \"...\" }}");
                };
                let path = self.resolve_path(file)?;
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Could not read {}", path.display()))?;
                FieldValue::Document(content)
            }
            Value::Table(table) => {
                let mut nested = Fields::new();
                for (name, value) in table {
                    nested.insert(name.clone(), self.field_value(FieldKind::String, value)?);
                }
                FieldValue::Record(nested)
            }
        })
    }

    // ========================================================================
    // Backend Construction
    // ========================================================================

    /// Build the configured gateway, wrapped in the retry policy
    pub fn gateway(&self) -> Result<Box<dyn BackendGateway>> {
        self.check_backend()?;
        let retry = self.retry.to_retry_config();

        let gateway: Box<dyn BackendGateway> = match self.backend.kind {
            BackendKind::Http => {
                let endpoint = self
                    .backend
                    .endpoint
                    .as_deref()
                    .context("backend.endpoint is required for the http backend")?;
                let mut http = HttpConfig::new(endpoint);
                http.api_version = self.backend.api_version.clone();
                http.timeout = Duration::from_secs(self.backend.timeout_secs);
                if let Some(var) = &self.backend.token_env {
                    let token = std::env::var(var)
                        .with_context(|| format!("backend.token_env: ${var} is not set"))?;
                    http.token = Some(token);
                }
                log::debug!("Using http backend at {endpoint}");
                Box::new(RetryingGateway::new(HttpGateway::new(http), retry))
            }
            BackendKind::File => {
                let path = match &self.backend.state_file {
                    Some(path) => self.resolve_path(path)?,
                    None => default_state_file()?,
                };
                log::debug!("Using file backend at {}", path.display());
                Box::new(RetryingGateway::new(FileGateway::new(path), retry))
            }
        };

        Ok(gateway)
    }

    /// Ledger location
    pub fn ledger_path(&self) -> Result<PathBuf> {
        match &self.ledger {
            Some(path) => self.resolve_path(path),
            None => crate::ledger::default_path(),
        }
    }
}

fn default_state_file() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home
        .join(".local")
        .join("state")
        .join("converge")
        .join("backend.json"))
}

/// Find a scope value by segment kind, accepting `resource_group` for `resourceGroup`
fn lookup_scope(scope: &BTreeMap<String, String>, segment_kind: &str) -> Option<String> {
    let wanted = scope_key(segment_kind);
    scope
        .iter()
        .find(|(key, _)| scope_key(key) == wanted)
        .map(|(_, value)| value.clone())
}

fn scope_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
