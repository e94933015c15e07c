//! Agent runner — wraps `Agent::execute` in the uniform task contract.
//!
//! Every call through [`AgentRunner::process`]:
//!
//! 1. Fails fast if the agent is already processing (no queueing)
//! 2. Writes a task record to shared memory (pending → running)
//! 3. Runs `execute` under the agent's hard deadline
//! 4. On deadline, drops the in-flight future and fires its cancellation token
//! 5. Finalizes the task record (completed/failed) and returns an [`AgentOutput`]
//!
//! Nothing escapes as an error: every outcome becomes an `AgentOutput`.

use flowsmith_core::agent::{Agent, AgentInput, AgentOutput, TaskRecord, TaskStatus};
use flowsmith_core::error::AgentError;
use flowsmith_core::memory::{self, SharedMemory, keys};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs one agent with reentrancy protection, deadlines, and task records.
pub struct AgentRunner<A: Agent> {
    agent: A,
    memory: Arc<dyn SharedMemory>,
    running: AtomicBool,
}

/// Clears the running flag however `process` exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

impl<A: Agent> AgentRunner<A> {
    pub fn new(agent: A, memory: Arc<dyn SharedMemory>) -> Self {
        Self {
            agent,
            memory,
            running: AtomicBool::new(false),
        }
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Execute the agent once under the task contract.
    pub async fn process(&self, input: &AgentInput) -> AgentOutput<A::Output> {
        let started = Instant::now();
        let config = self.agent.config();
        let agent_id = config.id.as_str();

        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            warn!(agent = agent_id, run_id = %input.run_id, "Rejected reentrant call");
            let err = AgentError::AlreadyRunning {
                agent_id: agent_id.to_string(),
            };
            return AgentOutput::failed(err.to_string(), elapsed_ms(started));
        };

        let mut record = TaskRecord::pending(uuid::Uuid::new_v4().to_string(), agent_id, &input.run_id);
        let record_key = keys::task(agent_id, &record.id);
        self.write_record(&record_key, &record).await;

        record.transition(TaskStatus::Running);
        self.write_record(&record_key, &record).await;

        debug!(agent = agent_id, run_id = %input.run_id, timeout_ms = config.timeout_ms, "Agent executing");

        let cancel = CancellationToken::new();
        let deadline = Duration::from_millis(config.timeout_ms);
        let outcome = tokio::time::timeout(deadline, self.agent.execute(input, cancel.clone())).await;

        let output = match outcome {
            Ok(Ok(result)) => {
                let units = self.agent.resource_units(&result);
                AgentOutput::succeeded(result, elapsed_ms(started), units)
            }
            Ok(Err(e)) => {
                warn!(agent = agent_id, run_id = %input.run_id, error = %e, "Agent failed");
                AgentOutput::failed(e.to_string(), elapsed_ms(started))
            }
            Err(_) => {
                // The execute future is already dropped; the token reaches
                // anything it spawned.
                cancel.cancel();
                let err = AgentError::Timeout {
                    agent_id: agent_id.to_string(),
                    timeout_ms: config.timeout_ms,
                };
                warn!(agent = agent_id, run_id = %input.run_id, "{err}");
                AgentOutput::timed_out(err.to_string(), elapsed_ms(started))
            }
        };

        record.error = output.error.clone();
        record.transition(if output.success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        });
        self.write_record(&record_key, &record).await;

        info!(
            agent = agent_id,
            run_id = %input.run_id,
            success = output.success,
            elapsed_ms = output.execution_time_ms,
            "Agent finished"
        );

        output
    }

    /// Task records are bookkeeping; failing to write one never fails the task.
    async fn write_record(&self, key: &str, record: &TaskRecord) {
        if let Err(e) = memory::set_typed(
            self.memory.as_ref(),
            key,
            record,
            &record.agent_id,
            Some(keys::TASK_TTL),
        )
        .await
        {
            warn!(key, error = %e, "Failed to write task record");
        }
    }
}
