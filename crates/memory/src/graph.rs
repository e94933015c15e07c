//! In-memory knowledge graph over the node catalog.
//!
//! Keyword relevance only; good enough for local runs and tests, and the
//! fallback when no graph bridge is configured.

use async_trait::async_trait;
use flowsmith_core::error::GraphError;
use flowsmith_core::graph::{CatalogDelta, CatalogEntry, GraphEdge, GraphInsights, GraphNode, GraphQuery, KnowledgeGraph};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub struct InMemoryKnowledgeGraph {
    entries: Arc<RwLock<BTreeMap<String, CatalogEntry>>>,
}

impl InMemoryKnowledgeGraph {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Seed the graph with catalog entries.
    pub fn with_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let map = entries.into_iter().map(|e| (e.id.clone(), e)).collect();
        Self {
            entries: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn get(&self, id: &str) -> Option<CatalogEntry> {
        self.entries.read().await.get(id).cloned()
    }
}

impl Default for InMemoryKnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl KnowledgeGraph for InMemoryKnowledgeGraph {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn query(&self, query: GraphQuery) -> Result<GraphInsights, GraphError> {
        let terms = tokenize(&query.text);
        if terms.is_empty() || query.top_k == 0 {
            return Ok(GraphInsights::default());
        }

        let entries = self.entries.read().await;
        let mut scored: Vec<GraphNode> = entries
            .values()
            .filter_map(|entry| {
                let haystack = format!("{} {}", entry.id, entry.display_name).to_lowercase();
                let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (hits > 0).then(|| GraphNode {
                    id: entry.id.clone(),
                    label: entry.display_name.clone(),
                    score: hits as f32 / terms.len() as f32,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(query.top_k);

        // Consecutive results are linked so callers can read a suggested order
        let edges = scored
            .windows(2)
            .map(|pair| GraphEdge {
                source: pair[0].id.clone(),
                target: pair[1].id.clone(),
                relation: "related".into(),
            })
            .collect();

        debug!(terms = terms.len(), hits = scored.len(), "In-memory graph query");
        Ok(GraphInsights { nodes: scored, edges })
    }

    async fn apply_update(&self, delta: &CatalogDelta) -> Result<(), GraphError> {
        let mut entries = self.entries.write().await;
        for entry in delta.added.iter().chain(delta.modified.iter()) {
            entries.insert(entry.id.clone(), entry.clone());
        }
        for entry in &delta.removed {
            entries.remove(&entry.id);
        }
        debug!(
            added = delta.added.len(),
            modified = delta.modified.len(),
            removed = delta.removed.len(),
            total = entries.len(),
            "Applied catalog delta"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str, version: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.into(),
            display_name: name.into(),
            version: version.into(),
        }
    }

    fn seeded() -> InMemoryKnowledgeGraph {
        InMemoryKnowledgeGraph::with_entries([
            entry("n8n-nodes-base.slack", "Slack", "2"),
            entry("n8n-nodes-base.postgres", "Postgres", "2"),
            entry("n8n-nodes-base.postgresTrigger", "Postgres Trigger", "1"),
            entry("n8n-nodes-base.gmail", "Gmail", "2"),
        ])
    }

    #[tokio::test]
    async fn query_ranks_by_term_hits() {
        let graph = seeded();
        let insights = graph
            .query(GraphQuery {
                text: "postgres trigger to slack".into(),
                top_k: 5,
            })
            .await
            .unwrap();

        assert_eq!(insights.nodes[0].id, "n8n-nodes-base.postgresTrigger");
        assert_eq!(insights.nodes.len(), 3);
        assert_eq!(insights.edges.len(), 2);
        assert!(insights.nodes.iter().all(|n| n.id != "n8n-nodes-base.gmail"));
    }

    #[tokio::test]
    async fn query_respects_top_k() {
        let graph = seeded();
        let insights = graph
            .query(GraphQuery {
                text: "postgres slack gmail".into(),
                top_k: 2,
            })
            .await
            .unwrap();
        assert_eq!(insights.nodes.len(), 2);
    }

    #[tokio::test]
    async fn apply_update_adds_modifies_and_removes() {
        let graph = seeded();
        let delta = CatalogDelta {
            added: vec![entry("n8n-nodes-base.notion", "Notion", "1")],
            modified: vec![entry("n8n-nodes-base.slack", "Slack", "3")],
            removed: vec![entry("n8n-nodes-base.gmail", "Gmail", "2")],
        };
        graph.apply_update(&delta).await.unwrap();

        assert_eq!(graph.len().await, 4);
        assert_eq!(graph.get("n8n-nodes-base.slack").await.unwrap().version, "3");
        assert!(graph.get("n8n-nodes-base.gmail").await.is_none());
        assert!(graph.get("n8n-nodes-base.notion").await.is_some());
    }
}
