//! Validator agent — layered workflow validation.
//!
//! Layers, in order:
//!
//! 1. Structural (object, non-empty nodes, connections map)
//! 2. Per-node fields (name, type, position, parameters)
//! 3. Connectivity (every reference resolves, canonical slot shape)
//! 4. Reachability (orphans)
//! 5. Topology (trigger and action presence)
//! 6. Compliance (server-managed fields)
//! 7. Optional semantic review (AI; warnings only)
//!
//! Layers 1–2 short-circuit on a critical error. The verdict is valid
//! iff no critical error was recorded; warnings never affect it.

pub mod result;
pub mod rules;
pub mod semantic;

pub use result::{
    ErrorKind, Severity, ValidationError, ValidationResult, ValidationStatistics,
    ValidationWarning, WarningKind,
};
pub use rules::{MAX_RECOMMENDED_NODES, WorkflowSummary, validate_structure};
pub use semantic::{SemanticReview, SemanticReviewer, parse_review};

use crate::registry::NodeRegistry;
use async_trait::async_trait;
use flowsmith_core::agent::{Agent, AgentConfig, AgentInput};
use flowsmith_core::error::AgentError;
use flowsmith_core::memory::{self, SharedMemory, keys};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fraction (1/n) of the stage deadline kept free for work after the review.
const REVIEW_RESERVE_DIVISOR: u32 = 5;

pub struct ValidatorAgent {
    config: AgentConfig,
    nodes: Arc<NodeRegistry>,
    reviewer: Option<SemanticReviewer>,
    memory: Arc<dyn SharedMemory>,
}

impl ValidatorAgent {
    pub fn new(config: AgentConfig, nodes: Arc<NodeRegistry>, memory: Arc<dyn SharedMemory>) -> Self {
        Self {
            config,
            nodes,
            reviewer: None,
            memory,
        }
    }

    /// Enable the semantic review layer.
    pub fn with_reviewer(mut self, reviewer: SemanticReviewer) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    /// Validate a workflow document directly, without shared memory.
    pub async fn validate(&self, workflow: &Value, cancel: &CancellationToken) -> ValidationResult {
        self.validate_by(workflow, cancel, None).await
    }

    /// Validate, ending the semantic review no later than `review_deadline`.
    pub async fn validate_by(
        &self,
        workflow: &Value,
        cancel: &CancellationToken,
        review_deadline: Option<Instant>,
    ) -> ValidationResult {
        let report = validate_structure(workflow, &self.nodes);
        let mut result = report.result;

        if let (Some(reviewer), Some(summary)) = (&self.reviewer, &report.summary) {
            match reviewer.review_by(summary, cancel, review_deadline).await {
                Some(SemanticReview::Parsed(warnings)) => {
                    debug!(count = warnings.len(), "Semantic review findings");
                    result.warnings.extend(warnings);
                }
                Some(SemanticReview::ParseError(reason)) => {
                    warn!(reason = %reason, "Semantic review reply unparseable; skipping");
                }
                None => {}
            }
        }

        result
    }
}

#[async_trait]
impl Agent for ValidatorAgent {
    type Output = ValidationResult;

    fn config(&self) -> &AgentConfig {
        &self.config
    }

    async fn execute(&self, input: &AgentInput, cancel: CancellationToken) -> Result<ValidationResult, AgentError> {
        let workflow_key = keys::run(&input.run_id, keys::WORKFLOW);
        let workflow = self
            .memory
            .get(&workflow_key)
            .await?
            .ok_or(AgentError::MissingUpstream { key: workflow_key })?;

        // The review must end early enough to leave room for persisting
        // the result inside the stage deadline.
        let budget = Duration::from_millis(self.config.timeout_ms);
        let review_deadline = Instant::now() + (budget - budget / REVIEW_RESERVE_DIVISOR);
        let result = self.validate_by(&workflow, &cancel, Some(review_deadline)).await;

        memory::set_typed(
            self.memory.as_ref(),
            &keys::run(&input.run_id, keys::VALIDATION),
            &result,
            &self.config.id,
            Some(keys::VALIDATION_TTL),
        )
        .await?;

        info!(
            run_id = %input.run_id,
            valid = result.valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Validation finished"
        );
        Ok(result)
    }

    fn resource_units(&self, output: &ValidationResult) -> Option<u64> {
        Some(output.node_count as u64)
    }
}
