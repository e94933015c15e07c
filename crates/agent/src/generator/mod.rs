//! Workflow agent — turns the selected pattern into a workflow.
//!
//! Reads `run:<id>:pattern` (required) and `run:<id>:graph-insights`
//! (optional) from shared memory, builds the workflow through the
//! template registry, and writes `run:<id>:workflow`.

pub mod templates;

pub use templates::{TemplateBuilder, TemplateContext, TemplateRegistry, generic_workflow};

use crate::registry::NodeRegistry;
use async_trait::async_trait;
use flowsmith_core::agent::{Agent, AgentConfig, AgentInput};
use flowsmith_core::error::AgentError;
use flowsmith_core::graph::GraphInsights;
use flowsmith_core::memory::{self, SharedMemory, keys};
use flowsmith_core::pattern::PatternMatch;
use flowsmith_core::workflow::Workflow;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct WorkflowAgent {
    config: AgentConfig,
    templates: TemplateRegistry,
    nodes: Arc<NodeRegistry>,
    memory: Arc<dyn SharedMemory>,
}

impl WorkflowAgent {
    pub fn new(
        config: AgentConfig,
        templates: TemplateRegistry,
        nodes: Arc<NodeRegistry>,
        memory: Arc<dyn SharedMemory>,
    ) -> Self {
        Self {
            config,
            templates,
            nodes,
            memory,
        }
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }
}

#[async_trait]
impl Agent for WorkflowAgent {
    type Output = Workflow;

    fn config(&self) -> &AgentConfig {
        &self.config
    }

    async fn execute(&self, input: &AgentInput, _cancel: CancellationToken) -> Result<Workflow, AgentError> {
        let pattern_key = keys::run(&input.run_id, keys::PATTERN);
        let pattern: PatternMatch = memory::get_typed(self.memory.as_ref(), &pattern_key)
            .await?
            .ok_or(AgentError::MissingUpstream { key: pattern_key })?;

        let insights: Option<GraphInsights> = memory::get_typed(
            self.memory.as_ref(),
            &keys::run(&input.run_id, keys::GRAPH_INSIGHTS),
        )
        .await?;
        debug!(
            run_id = %input.run_id,
            pattern = %pattern.pattern_id,
            insight_nodes = insights.as_ref().map_or(0, |i| i.nodes.len()),
            "Generating workflow"
        );

        let ctx = TemplateContext {
            goal: &input.goal,
            pattern: &pattern,
            insights: insights.as_ref(),
            nodes: &self.nodes,
        };
        let workflow = self.templates.build(&ctx);

        memory::set_typed(
            self.memory.as_ref(),
            &keys::run(&input.run_id, keys::WORKFLOW),
            &workflow,
            &self.config.id,
            Some(keys::WORKFLOW_TTL),
        )
        .await?;

        info!(
            run_id = %input.run_id,
            workflow = %workflow.name,
            nodes = workflow.nodes.len(),
            edges = workflow.edge_count(),
            "Workflow generated"
        );
        Ok(workflow)
    }

    fn resource_units(&self, output: &Workflow) -> Option<u64> {
        Some(output.nodes.len() as u64)
    }
}
