//! Automation platform trait — the remote system workflows are deployed to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::error::PlatformError;
use crate::workflow::Workflow;

/// A node type as advertised by the platform's catalog.
///
/// Only the identity fields are typed; everything else the platform sends
/// (icons, property schemas, credentials, ...) lands in `extra` and is
/// treated as volatile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTypeDescriptor {
    /// Stable identifier, e.g. `n8n-nodes-base.slack`.
    pub name: String,

    #[serde(rename = "displayName", default)]
    pub display_name: String,

    /// A single number, a string, or a list of supported versions.
    #[serde(default)]
    pub version: Value,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeTypeDescriptor {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, version: Value) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            version,
            extra: Map::new(),
        }
    }
}

/// The remote automation platform's API surface.
#[async_trait]
pub trait AutomationPlatform: Send + Sync {
    /// Fetch the full node-type catalog.
    async fn fetch_node_catalog(&self) -> std::result::Result<Vec<NodeTypeDescriptor>, PlatformError>;

    /// Create a workflow; returns the platform-assigned id.
    async fn create_workflow(&self, workflow: &Workflow) -> std::result::Result<String, PlatformError>;

    /// Fetch an existing workflow by id.
    async fn get_workflow(&self, id: &str) -> std::result::Result<Workflow, PlatformError>;

    /// Replace an existing workflow.
    async fn update_workflow(&self, id: &str, workflow: &Workflow) -> std::result::Result<(), PlatformError>;
}
