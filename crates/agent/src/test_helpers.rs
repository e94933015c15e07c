//! Shared test doubles for agent and orchestrator tests.

use async_trait::async_trait;
use flowsmith_core::error::{GraphError, ProviderError};
use flowsmith_core::graph::{CatalogDelta, GraphInsights, GraphNode, GraphQuery, KnowledgeGraph};
use flowsmith_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A provider that replays scripted generation responses and computes
/// embeddings with a plain function.
pub struct MockProvider {
    available: bool,
    embedder: Option<fn(&str) -> Vec<f32>>,
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_request: Mutex<Option<ProviderRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            available: true,
            embedder: None,
            responses: Mutex::new(VecDeque::new()),
            delay: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn with_embedder(mut self, embedder: fn(&str) -> Vec<f32>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_response(self, text: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn with_error(self, error: ProviderError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn supports_embeddings(&self) -> bool {
        self.available && self.embedder.is_some()
    }

    async fn generate(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(ProviderResponse {
                text,
                model: request.model,
                usage: None,
            }),
            Some(Err(e)) => Err(e),
            None => Err(ProviderError::NotConfigured("no scripted response".into())),
        }
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let embedder = self
            .embedder
            .ok_or_else(|| ProviderError::NotConfigured("no embedder".into()))?;
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|t| embedder(t)).collect(),
            model: request.model,
        })
    }
}

/// A knowledge graph returning a fixed answer and recording queries.
pub struct MockGraph {
    answer: Result<GraphInsights, GraphError>,
    queries: Mutex<Vec<GraphQuery>>,
}

impl MockGraph {
    pub fn with_nodes(ids: &[&str]) -> Self {
        let nodes = ids
            .iter()
            .enumerate()
            .map(|(i, id)| GraphNode {
                id: id.to_string(),
                label: id.rsplit('.').next().unwrap_or(id).to_string(),
                score: 1.0 - i as f32 * 0.1,
            })
            .collect();
        Self {
            answer: Ok(GraphInsights {
                nodes,
                edges: Vec::new(),
            }),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: Err(GraphError::Unavailable("bridge down".into())),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<GraphQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeGraph for MockGraph {
    fn name(&self) -> &str {
        "mock_graph"
    }

    async fn query(&self, query: GraphQuery) -> Result<GraphInsights, GraphError> {
        self.queries.lock().unwrap().push(query);
        self.answer.clone()
    }

    async fn apply_update(&self, _delta: &CatalogDelta) -> Result<(), GraphError> {
        Ok(())
    }
}
