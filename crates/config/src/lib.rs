//! Configuration loading, validation, and management for Flowsmith.
//!
//! Loads configuration from `~/.flowsmith/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.flowsmith/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote automation platform
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Generation/embedding capability
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Per-agent deadlines and budgets
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Pipeline feature flags
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Knowledge-graph bridge
    #[serde(default)]
    pub graph: GraphConfig,

    /// Background catalog sync
    #[serde(default)]
    pub sync: SyncConfig,

    /// Pattern library extensions
    #[serde(default)]
    pub patterns: PatternsConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_platform_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Path of the node-type catalog, relative to `base_url`
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    #[serde(default = "default_platform_timeout")]
    pub timeout_secs: u64,
}

fn default_platform_url() -> String {
    "http://localhost:5678".into()
}
fn default_catalog_path() -> String {
    "/types/nodes.json".into()
}
fn default_platform_timeout() -> u64 {
    30
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_platform_url(),
            api_key: None,
            catalog_path: default_catalog_path(),
            timeout_secs: default_platform_timeout(),
        }
    }
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("catalog_path", &self.catalog_path)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// `openai` (any OpenAI-compatible endpoint) or `none`
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    #[serde(default = "default_provider_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding model; semantic pattern matching is off when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_provider_kind() -> String {
    "none".into()
}
fn default_provider_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            base_url: default_provider_url(),
            api_key: None,
            model: default_model(),
            embedding_model: None,
            temperature: default_temperature(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "default_pattern_timeout")]
    pub pattern_timeout_ms: u64,

    #[serde(default = "default_workflow_timeout")]
    pub workflow_timeout_ms: u64,

    #[serde(default = "default_validator_timeout")]
    pub validator_timeout_ms: u64,

    /// Deadline for the optional AI review inside validation
    #[serde(default = "default_semantic_timeout")]
    pub semantic_review_timeout_ms: u64,

    #[serde(default = "default_context_budget")]
    pub context_budget: u32,
}

fn default_pattern_timeout() -> u64 {
    15_000
}
fn default_workflow_timeout() -> u64 {
    30_000
}
fn default_validator_timeout() -> u64 {
    30_000
}
fn default_semantic_timeout() -> u64 {
    10_000
}
fn default_context_budget() -> u32 {
    8_000
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            pattern_timeout_ms: default_pattern_timeout(),
            workflow_timeout_ms: default_workflow_timeout(),
            validator_timeout_ms: default_validator_timeout(),
            semantic_review_timeout_ms: default_semantic_timeout(),
            context_budget: default_context_budget(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Run the knowledge-graph query stage
    #[serde(default = "default_true")]
    pub enable_graph_insights: bool,

    #[serde(default = "default_graph_top_k")]
    pub graph_top_k: usize,
}

fn default_true() -> bool {
    true
}
fn default_graph_top_k() -> usize {
    5
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_graph_insights: true,
            graph_top_k: default_graph_top_k(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    /// HTTP bridge endpoint; the in-memory graph is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,

    /// Upper bound of the random delay added to every interval
    #[serde(default = "default_sync_jitter")]
    pub jitter_secs: u64,

    /// Where the last catalog snapshot is persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

fn default_sync_interval() -> u64 {
    3_600
}
fn default_sync_jitter() -> u64 {
    300
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_sync_interval(),
            jitter_secs: default_sync_jitter(),
            state_path: None,
        }
    }
}

impl SyncConfig {
    /// Configured state path or `~/.flowsmith/state/catalog.json`.
    pub fn resolved_state_path(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("state").join("catalog.json"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternsConfig {
    /// Extra patterns (JSON or TOML) merged over the built-in library
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.flowsmith/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `FLOWSMITH_PLATFORM_URL`
    /// - `FLOWSMITH_PLATFORM_API_KEY`, then `N8N_API_KEY`
    /// - `FLOWSMITH_API_KEY`, then `OPENAI_API_KEY`
    /// - `FLOWSMITH_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from a specific path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(url) = env("FLOWSMITH_PLATFORM_URL") {
            self.platform.base_url = url;
        }

        if let Some(key) = env("FLOWSMITH_PLATFORM_API_KEY").or_else(|| env("N8N_API_KEY")) {
            self.platform.api_key = Some(key);
        }

        if self.provider.api_key.is_none() {
            self.provider.api_key = env("FLOWSMITH_API_KEY").or_else(|| env("OPENAI_API_KEY"));
        }

        if let Some(model) = env("FLOWSMITH_MODEL") {
            self.provider.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".flowsmith")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.temperature < 0.0 || self.provider.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let timeouts = [
            ("agents.pattern_timeout_ms", self.agents.pattern_timeout_ms),
            ("agents.workflow_timeout_ms", self.agents.workflow_timeout_ms),
            ("agents.validator_timeout_ms", self.agents.validator_timeout_ms),
            ("agents.semantic_review_timeout_ms", self.agents.semantic_review_timeout_ms),
            ("platform.timeout_secs", self.platform.timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
        }

        if self.agents.semantic_review_timeout_ms >= self.agents.validator_timeout_ms {
            return Err(ConfigError::ValidationError(
                "agents.semantic_review_timeout_ms must be smaller than agents.validator_timeout_ms"
                    .into(),
            ));
        }

        if self.pipeline.graph_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.graph_top_k must be >= 1".into(),
            ));
        }

        if self.sync.interval_secs == 0 || self.sync.jitter_secs >= self.sync.interval_secs {
            return Err(ConfigError::ValidationError(
                "sync.jitter_secs must be smaller than a non-zero sync.interval_secs".into(),
            ));
        }

        if !matches!(self.provider.kind.as_str(), "openai" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "unknown provider.kind '{}' (expected 'openai' or 'none')",
                self.provider.kind
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider.kind, "none");
        assert_eq!(config.pipeline.graph_top_k, 5);
        assert!(!config.sync.enabled);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.platform.base_url, config.platform.base_url);
        assert_eq!(parsed.sync.interval_secs, config.sync.interval_secs);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn jitter_must_be_below_interval() {
        let mut config = AppConfig::default();
        config.sync.interval_secs = 60;
        config.sync.jitter_secs = 60;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jitter"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = AppConfig::default();
        config.agents.validator_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("validator_timeout_ms"));
    }

    #[test]
    fn review_timeout_must_fit_inside_validator_timeout() {
        let mut config = AppConfig::default();
        config.agents.validator_timeout_ms = 5_000;
        config.agents.semantic_review_timeout_ms = 10_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("semantic_review_timeout_ms"));

        config.agents.semantic_review_timeout_ms = 5_000;
        assert!(config.validate().is_err());

        config.agents.semantic_review_timeout_ms = 4_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.platform.base_url, "http://localhost:5678");
    }

    #[test]
    fn loads_partial_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[provider]
kind = "openai"
embedding_model = "text-embedding-3-small"

[sync]
enabled = true
interval_secs = 600
jitter_secs = 30
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.provider.kind, "openai");
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert!(config.sync.enabled);
        assert_eq!(config.sync.jitter_secs, 30);
        assert!(config.pipeline.enable_graph_insights);
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "platform = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("FLOWSMITH_PLATFORM_URL", "https://n8n.internal"),
            ("N8N_API_KEY", "n8n-key"),
            ("OPENAI_API_KEY", "sk-fallback"),
            ("FLOWSMITH_MODEL", "gpt-4.1"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.platform.base_url, "https://n8n.internal");
        assert_eq!(config.platform.api_key.as_deref(), Some("n8n-key"));
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-fallback"));
        assert_eq!(config.provider.model, "gpt-4.1");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config.platform.api_key = Some("super-secret".into());
        config.provider.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("localhost:5678"));
        assert!(toml_str.contains("graph_top_k"));
    }
}
