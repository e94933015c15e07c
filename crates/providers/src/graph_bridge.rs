//! HTTP knowledge-graph bridge.
//!
//! - `POST {base}/query`  `{ "text": ..., "topK": n }` → `{ "nodes": [...], "edges": [...] }`
//! - `POST {base}/update` `{ "added": [...], "modified": [...], "removed": [...] }`

use async_trait::async_trait;
use flowsmith_core::error::GraphError;
use flowsmith_core::graph::{CatalogDelta, GraphInsights, GraphQuery, KnowledgeGraph};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub struct HttpGraphBridge {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    text: &'a str,
    top_k: usize,
}

impl HttpGraphBridge {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, String> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("status {status}: {text}"));
        }
        Ok(response)
    }
}

#[async_trait]
impl KnowledgeGraph for HttpGraphBridge {
    fn name(&self) -> &str {
        "http_bridge"
    }

    async fn query(&self, query: GraphQuery) -> Result<GraphInsights, GraphError> {
        let body = QueryBody {
            text: &query.text,
            top_k: query.top_k,
        };
        let response = self
            .post("/query", &body)
            .await
            .map_err(GraphError::QueryFailed)?;
        let insights: GraphInsights = response
            .json()
            .await
            .map_err(|e| GraphError::QueryFailed(format!("invalid response: {e}")))?;
        debug!(nodes = insights.nodes.len(), "Graph bridge query");
        Ok(insights)
    }

    async fn apply_update(&self, delta: &CatalogDelta) -> Result<(), GraphError> {
        self.post("/update", delta)
            .await
            .map_err(GraphError::UpdateFailed)?;
        debug!(changes = delta.len(), "Graph bridge update applied");
        Ok(())
    }
}
