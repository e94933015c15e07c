//! Agent contract — configuration, input, structured output, task records.
//!
//! Agents implement [`Agent::execute`] and return `Result`. The runner in
//! `flowsmith-agent` wraps that call and converts every outcome (errors,
//! timeouts, reentrancy) into an [`AgentOutput`], which is what crosses
//! the agent boundary. An `AgentOutput` is never an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use crate::error::AgentError;

/// What kind of stage an agent implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    PatternDiscovery,
    WorkflowGeneration,
    Validation,
}

/// Static configuration for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    pub role: AgentRole,

    /// Context/resource budget in tokens
    #[serde(default = "default_context_budget")]
    pub context_budget: u32,

    /// Hard deadline for one `execute` call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_context_budget() -> u32 {
    8_000
}
fn default_timeout_ms() -> u64 {
    30_000
}

impl AgentConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: AgentRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            context_budget: default_context_budget(),
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_context_budget(mut self, budget: u32) -> Self {
        self.context_budget = budget;
        self
    }
}

/// Input handed to every stage of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInput {
    /// Correlation id scoping every shared-memory key of the run.
    pub run_id: String,

    /// The natural-language goal.
    pub goal: String,

    /// Caller-supplied context (free-form).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl AgentInput {
    pub fn new(run_id: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            goal: goal.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// The structured outcome of one `process` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput<T> {
    pub success: bool,
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the stage exceeded its deadline and was cancelled.
    #[serde(default)]
    pub timed_out: bool,
    /// Wall time in milliseconds (fractional).
    pub execution_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_units_used: Option<u64>,
}

impl<T> AgentOutput<T> {
    pub fn succeeded(result: T, execution_time_ms: f64, resource_units_used: Option<u64>) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            timed_out: false,
            execution_time_ms,
            resource_units_used,
        }
    }

    pub fn failed(error: impl Into<String>, execution_time_ms: f64) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            timed_out: false,
            execution_time_ms,
            resource_units_used: None,
        }
    }

    pub fn timed_out(error: impl Into<String>, execution_time_ms: f64) -> Self {
        Self {
            timed_out: true,
            ..Self::failed(error, execution_time_ms)
        }
    }
}

/// Lifecycle of a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Bookkeeping written to shared memory around every `execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub agent_id: String,
    pub run_id: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskRecord {
    pub fn pending(id: impl Into<String>, agent_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            run_id: run_id.into(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    pub fn transition(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// The contract every specialized agent implements.
///
/// `execute` receives a cancellation token that fires when the stage's
/// deadline passes; long-running work must observe it.
#[async_trait]
pub trait Agent: Send + Sync {
    type Output: Serialize + Send + Sync;

    fn config(&self) -> &AgentConfig;

    async fn execute(
        &self,
        input: &AgentInput,
        cancel: CancellationToken,
    ) -> std::result::Result<Self::Output, AgentError>;

    /// Resource units consumed producing `output`, if the agent tracks them.
    fn resource_units(&self, _output: &Self::Output) -> Option<u64> {
        None
    }
}
