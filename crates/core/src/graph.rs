//! Knowledge graph trait — a best-effort index over the node catalog.
//!
//! The pipeline queries it for related node types; the sync loop feeds it
//! incremental catalog deltas. Readers must tolerate eventually-consistent
//! content: there is no locking between the writer and concurrent readers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::GraphError;

/// The stable identity of one catalog node type.
///
/// Field order is part of the fingerprint format; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub display_name: String,
    pub version: String,
}

/// One incremental batch: three disjoint sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDelta {
    pub added: Vec<CatalogEntry>,
    pub modified: Vec<CatalogEntry>,
    pub removed: Vec<CatalogEntry>,
}

impl CatalogDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }
}

/// A free-text lookup against the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQuery {
    pub text: String,
    pub top_k: usize,
}

/// A node in a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub score: f32,
}

/// A relation between two result nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub relation: String,
}

/// Related catalog entries for a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphInsights {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl GraphInsights {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// The knowledge-graph bridge.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    fn name(&self) -> &str;

    async fn query(&self, query: GraphQuery) -> std::result::Result<GraphInsights, GraphError>;

    async fn apply_update(&self, delta: &CatalogDelta) -> std::result::Result<(), GraphError>;
}
