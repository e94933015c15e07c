//! Subcommand implementations and the wiring they share.

pub mod init;
pub mod patterns;
pub mod run;
pub mod sync;
pub mod validate;

use flowsmith_config::AppConfig;
use flowsmith_core::graph::KnowledgeGraph;
use flowsmith_providers::HttpGraphBridge;
use std::path::Path;
use std::sync::Arc;

/// Load config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

/// The knowledge-graph bridge, when one is configured.
pub fn build_graph(config: &AppConfig) -> Option<Arc<dyn KnowledgeGraph>> {
    config
        .graph
        .bridge_url
        .as_deref()
        .map(|url| Arc::new(HttpGraphBridge::new(url)) as Arc<dyn KnowledgeGraph>)
}
