//! The Flowsmith agent pipeline.
//!
//! A goal flows through three specialized agents, each wrapped by the
//! same task contract ([`AgentRunner::process`]) and coordinated by the
//! [`Orchestrator`]:
//!
//! 1. **Pattern agent** matches the goal against the pattern library
//! 2. **Workflow agent** builds a workflow from the matched pattern
//! 3. **Validator agent** checks the workflow layer by layer
//!
//! Stages never call each other. Each reads its inputs from and writes
//! its output to shared memory under `run:<run_id>:<stage>` keys.

pub mod generator;
pub mod orchestrator;
pub mod pattern;
pub mod registry;
pub mod runner;
pub mod validator;

pub use generator::{TemplateContext, TemplateRegistry, WorkflowAgent};
pub use orchestrator::{ExecutionStats, Orchestrator, PipelineOptions, PipelineResult};
pub use pattern::{MatchStrategy, PatternAgent, builtin_patterns, extract_keywords};
pub use registry::{NodeClass, NodeRegistry};
pub use runner::AgentRunner;
pub use validator::{
    SemanticReview, SemanticReviewer, Severity, ValidationResult, ValidatorAgent, validate_structure,
};

#[cfg(test)]
pub(crate) mod test_helpers;
