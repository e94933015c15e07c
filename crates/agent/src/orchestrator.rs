//! Orchestrator — drives the four pipeline stages for one goal.
//!
//! ```text
//! pattern discovery ─▶ graph query (optional) ─▶ workflow generation ─▶ validation
//! ```
//!
//! Stages run strictly in sequence and communicate only through shared
//! memory, under keys scoped by a fresh run id. A failed stage aborts the
//! rest; the orchestrator still returns a complete [`PipelineResult`] with
//! whatever finished, per-stage timings, and the error list.

use crate::generator::{TemplateRegistry, WorkflowAgent};
use crate::pattern::{PatternAgent, builtin_patterns, load_patterns_file, merge_patterns};
use crate::registry::NodeRegistry;
use crate::runner::{AgentRunner, elapsed_ms};
use crate::validator::{SemanticReviewer, Severity, ValidationResult, ValidatorAgent};
use flowsmith_config::{AppConfig, PipelineConfig};
use flowsmith_core::agent::{AgentConfig, AgentInput, AgentRole};
use flowsmith_core::error::AgentError;
use flowsmith_core::event::{DomainEvent, EventBus};
use flowsmith_core::graph::{GraphInsights, GraphQuery, KnowledgeGraph};
use flowsmith_core::memory::{self, SharedMemory, keys};
use flowsmith_core::pattern::PatternMatch;
use flowsmith_core::provider::Provider;
use flowsmith_core::workflow::Workflow;
use flowsmith_memory::InMemorySharedMemory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const SOURCE: &str = "orchestrator";

/// Suggested node types folded into the graph query, at most.
const MAX_QUERY_NODES: usize = 3;

/// Per-stage wall time in milliseconds; zero for stages that never ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub pattern_discovery_time: f64,
    pub graph_query_time: f64,
    pub workflow_generation_time: f64,
    pub validation_time: f64,
    pub total_time: f64,
}

/// Aggregate outcome of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    pub run_id: String,
    pub pattern: Option<PatternMatch>,
    pub graph_insights: Option<GraphInsights>,
    pub workflow: Option<Workflow>,
    pub validation_result: Option<ValidationResult>,
    pub execution_stats: ExecutionStats,
    pub errors: Vec<String>,
}

impl PipelineResult {
    fn new(run_id: String) -> Self {
        Self {
            success: false,
            run_id,
            pattern: None,
            graph_insights: None,
            workflow: None,
            validation_result: None,
            execution_stats: ExecutionStats::default(),
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub enable_graph_insights: bool,
    pub graph_top_k: usize,
    pub graph_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            enable_graph_insights: true,
            graph_top_k: 5,
            graph_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            enable_graph_insights: config.enable_graph_insights,
            graph_top_k: config.graph_top_k,
            ..Self::default()
        }
    }
}

pub struct Orchestrator {
    memory: Arc<dyn SharedMemory>,
    pattern: AgentRunner<PatternAgent>,
    workflow: AgentRunner<WorkflowAgent>,
    validator: AgentRunner<ValidatorAgent>,
    graph: Option<Arc<dyn KnowledgeGraph>>,
    events: Arc<EventBus>,
    options: PipelineOptions,
}

impl Orchestrator {
    /// Assemble an orchestrator. All three agents must have been built
    /// against `memory`.
    pub fn new(
        memory: Arc<dyn SharedMemory>,
        pattern: PatternAgent,
        workflow: WorkflowAgent,
        validator: ValidatorAgent,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            pattern: AgentRunner::new(pattern, memory.clone()),
            workflow: AgentRunner::new(workflow, memory.clone()),
            validator: AgentRunner::new(validator, memory.clone()),
            memory,
            graph: None,
            events,
            options: PipelineOptions::default(),
        }
    }

    /// Wire the full pipeline from configuration, with a private shared
    /// memory instance.
    pub async fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        graph: Option<Arc<dyn KnowledgeGraph>>,
        events: Arc<EventBus>,
    ) -> Result<Self, AgentError> {
        let memory: Arc<dyn SharedMemory> = Arc::new(InMemorySharedMemory::new());
        let nodes = Arc::new(NodeRegistry::builtin());
        let agents = &config.agents;

        let mut patterns = builtin_patterns();
        if let Some(path) = &config.patterns.extra_file {
            let extra = load_patterns_file(path)?;
            info!(count = extra.len(), path = %path.display(), "Loaded extra patterns");
            patterns = merge_patterns(patterns, extra);
        }

        let mut pattern = PatternAgent::new(
            AgentConfig::new("pattern-agent", "Pattern Agent", AgentRole::PatternDiscovery)
                .with_timeout_ms(agents.pattern_timeout_ms)
                .with_context_budget(agents.context_budget),
            patterns,
            memory.clone(),
        );
        if let Some(model) = &config.provider.embedding_model {
            pattern = pattern.with_embeddings(provider.clone(), model.clone()).await;
        }

        let workflow = WorkflowAgent::new(
            AgentConfig::new("workflow-agent", "Workflow Agent", AgentRole::WorkflowGeneration)
                .with_timeout_ms(agents.workflow_timeout_ms)
                .with_context_budget(agents.context_budget),
            TemplateRegistry::builtin(),
            nodes.clone(),
            memory.clone(),
        );

        let reviewer = SemanticReviewer::new(
            provider,
            config.provider.model.clone(),
            Duration::from_millis(agents.semantic_review_timeout_ms),
        )
        .with_temperature(config.provider.temperature);
        let validator = ValidatorAgent::new(
            AgentConfig::new("validator-agent", "Validator Agent", AgentRole::Validation)
                .with_timeout_ms(agents.validator_timeout_ms)
                .with_context_budget(agents.context_budget),
            nodes,
            memory.clone(),
        )
        .with_reviewer(reviewer);

        let mut orchestrator = Self::new(memory, pattern, workflow, validator, events)
            .with_options(PipelineOptions::from(&config.pipeline));
        if let Some(graph) = graph {
            orchestrator = orchestrator.with_graph(graph);
        }
        Ok(orchestrator)
    }

    pub fn with_graph(mut self, graph: Arc<dyn KnowledgeGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn memory(&self) -> &Arc<dyn SharedMemory> {
        &self.memory
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    fn publish(&self, event: DomainEvent) {
        self.events.publish(SOURCE, event);
    }

    /// Run the pipeline for one goal. Never fails; inspect `success`.
    pub async fn execute_pipeline(&self, goal: &str, context: Option<serde_json::Value>) -> PipelineResult {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut result = PipelineResult::new(run_id.clone());

        info!(run_id = %run_id, goal, "Pipeline started");
        self.publish(DomainEvent::PipelineStarted {
            run_id: run_id.clone(),
            goal: goal.to_string(),
        });

        match self.memory.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "Purged expired shared-memory entries"),
            Err(e) => warn!(error = %e, "Failed to purge expired entries"),
        }

        let mut input = AgentInput::new(&run_id, goal);
        if let Some(context) = context {
            input = input.with_context(context);
        }

        // 1. Pattern discovery
        let stage = Instant::now();
        let output = self.pattern.process(&input).await;
        result.execution_stats.pattern_discovery_time = elapsed_ms(stage);
        if !output.success {
            result.errors.push(stage_error("Pattern discovery", output.error));
            return self.finish(result, started);
        }
        let Some(pattern) = output.result.and_then(|matches| matches.into_iter().next()) else {
            result.errors.push("Pattern discovery produced no match".into());
            return self.finish(result, started);
        };
        self.publish(DomainEvent::PatternDiscovered {
            run_id: run_id.clone(),
            pattern_id: pattern.pattern_id.clone(),
            confidence: pattern.confidence,
        });

        // 2. Knowledge-graph query (best effort)
        if self.options.enable_graph_insights {
            if let Some(graph) = &self.graph {
                let stage = Instant::now();
                result.graph_insights = self.query_graph(graph.as_ref(), goal, &pattern, &run_id).await;
                result.execution_stats.graph_query_time = elapsed_ms(stage);
            }
        }
        result.pattern = Some(pattern);

        // 3. Workflow generation
        let stage = Instant::now();
        let output = self.workflow.process(&input).await;
        result.execution_stats.workflow_generation_time = elapsed_ms(stage);
        if !output.success {
            result.errors.push(stage_error("Workflow generation", output.error));
            return self.finish(result, started);
        }
        if let Some(workflow) = &output.result {
            self.publish(DomainEvent::WorkflowCreated {
                run_id: run_id.clone(),
                workflow_name: workflow.name.clone(),
                node_count: workflow.nodes.len(),
            });
        }
        result.workflow = output.result;

        // 4. Validation
        let stage = Instant::now();
        let output = self.validator.process(&input).await;
        result.execution_stats.validation_time = elapsed_ms(stage);
        if !output.success {
            let error = stage_error("Validation", output.error);
            self.publish(DomainEvent::ValidationFailed {
                run_id: run_id.clone(),
                error_count: 0,
                first_error: Some(error.clone()),
            });
            result.errors.push(error);
            return self.finish(result, started);
        }
        if let Some(validation) = &output.result {
            if validation.valid {
                self.publish(DomainEvent::ValidationCompleted {
                    run_id: run_id.clone(),
                    error_count: validation.errors.len(),
                    warning_count: validation.warnings.len(),
                });
                result.success = true;
            } else {
                let critical: Vec<String> = validation
                    .errors_of(Severity::Critical)
                    .map(|e| e.message.clone())
                    .collect();
                self.publish(DomainEvent::ValidationFailed {
                    run_id: run_id.clone(),
                    error_count: validation.errors.len(),
                    first_error: critical.first().cloned(),
                });
                result
                    .errors
                    .extend(critical.into_iter().map(|m| format!("Validation: {m}")));
            }
        }
        result.validation_result = output.result;

        self.finish(result, started)
    }

    async fn query_graph(
        &self,
        graph: &dyn KnowledgeGraph,
        goal: &str,
        pattern: &PatternMatch,
        run_id: &str,
    ) -> Option<GraphInsights> {
        let query = GraphQuery {
            text: graph_query_text(goal, pattern),
            top_k: self.options.graph_top_k,
        };

        let insights = match tokio::time::timeout(self.options.graph_timeout, graph.query(query)).await {
            Ok(Ok(insights)) => insights,
            Ok(Err(e)) => {
                warn!(run_id, graph = graph.name(), error = %e, "Graph query failed; continuing without insights");
                return None;
            }
            Err(_) => {
                warn!(run_id, graph = graph.name(), "Graph query timed out; continuing without insights");
                return None;
            }
        };
        if insights.is_empty() {
            debug!(run_id, "Graph query returned nothing");
            return None;
        }

        if let Err(e) = memory::set_typed(
            self.memory.as_ref(),
            &keys::run(run_id, keys::GRAPH_INSIGHTS),
            &insights,
            SOURCE,
            Some(keys::GRAPH_INSIGHTS_TTL),
        )
        .await
        {
            warn!(run_id, error = %e, "Failed to store graph insights");
            return None;
        }
        debug!(run_id, nodes = insights.nodes.len(), "Graph insights stored");
        Some(insights)
    }

    fn finish(&self, mut result: PipelineResult, started: Instant) -> PipelineResult {
        result.execution_stats.total_time = elapsed_ms(started);
        if result.success {
            info!(
                run_id = %result.run_id,
                total_ms = result.execution_stats.total_time,
                "Pipeline completed"
            );
            self.publish(DomainEvent::PipelineCompleted {
                run_id: result.run_id.clone(),
                total_time_ms: result.execution_stats.total_time,
            });
        } else {
            warn!(run_id = %result.run_id, errors = ?result.errors, "Pipeline failed");
            self.publish(DomainEvent::PipelineFailed {
                run_id: result.run_id.clone(),
                errors: result.errors.clone(),
            });
        }
        result
    }
}

fn stage_error(stage: &str, error: Option<String>) -> String {
    format!("{stage} failed: {}", error.unwrap_or_else(|| "unknown error".into()))
}

/// Goal, pattern name, and up to three suggested node types.
fn graph_query_text(goal: &str, pattern: &PatternMatch) -> String {
    let mut parts = vec![goal.trim(), pattern.pattern_name.as_str()];
    parts.extend(
        pattern
            .suggested_nodes
            .iter()
            .take(MAX_QUERY_NODES)
            .map(String::as_str),
    );
    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}
