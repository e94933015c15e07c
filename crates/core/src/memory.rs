//! Shared memory trait — the TTL-aware blackboard agents coordinate through.
//!
//! Pipeline stages never call each other directly. Each stage writes its
//! output under a run-scoped key and the next stage reads it back, so any
//! stage's output can be inspected or replayed on its own.
//!
//! Semantics every backend must honor:
//! - An expired entry is invisible to `get`/`query` and may be reclaimed.
//! - Last write to a key wins.
//! - The writer id is provenance only; any agent may read any key.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use crate::error::MemoryError;

/// A single stored value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub key: String,

    pub value: serde_json::Value,

    /// Id of the agent that wrote this entry
    pub agent_id: String,

    pub created_at: DateTime<Utc>,

    /// Time-to-live in milliseconds from `created_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
}

impl MemoryEntry {
    /// `None` means the entry never expires, either because it has no TTL
    /// or because the TTL reaches past the representable date range.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ms = i64::try_from(self.ttl_ms?).ok()?;
        self.created_at
            .checked_add_signed(TimeDelta::try_milliseconds(ms)?)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|at| now >= at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Filter for [`SharedMemory::query`]. All set fields must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryQuery {
    /// Key glob; `*` matches any run of characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    /// Only entries written within this many milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_ms: Option<u64>,
}

impl MemoryQuery {
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Self::default()
        }
    }

    pub fn by_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age_ms = Some(saturating_millis(max_age));
        self
    }
}

/// Milliseconds in `d`, clamped to `u64::MAX`.
pub fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// The core SharedMemory trait.
///
/// Implementations: in-memory (the default, one instance per orchestrator).
#[async_trait]
pub trait SharedMemory: Send + Sync {
    /// Store a value, replacing any previous value under the key.
    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        writer: &str,
        ttl: Option<Duration>,
    ) -> std::result::Result<(), MemoryError>;

    /// Read a live value.
    async fn get(&self, key: &str) -> std::result::Result<Option<serde_json::Value>, MemoryError>;

    /// Remove a key. Returns whether a live entry was removed.
    async fn delete(&self, key: &str, requester: &str) -> std::result::Result<bool, MemoryError>;

    /// All live entries matching the filter, ordered by key.
    async fn query(&self, query: &MemoryQuery) -> std::result::Result<Vec<MemoryEntry>, MemoryError>;

    /// Every live key/value written by one agent.
    async fn agent_memory(
        &self,
        agent_id: &str,
    ) -> std::result::Result<HashMap<String, serde_json::Value>, MemoryError>;

    /// Remove everything one agent wrote. Returns the number removed.
    async fn clear_agent_memory(&self, agent_id: &str) -> std::result::Result<usize, MemoryError>;

    /// Reclaim expired entries. Returns the number removed.
    async fn purge_expired(&self) -> std::result::Result<usize, MemoryError>;
}

/// Serialize and store a typed value.
pub async fn set_typed<T: Serialize + ?Sized>(
    memory: &dyn SharedMemory,
    key: &str,
    value: &T,
    writer: &str,
    ttl: Option<Duration>,
) -> std::result::Result<(), MemoryError> {
    let value = serde_json::to_value(value).map_err(|e| MemoryError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    memory.set(key, value, writer, ttl).await
}

/// Read and deserialize a typed value.
pub async fn get_typed<T: DeserializeOwned>(
    memory: &dyn SharedMemory,
    key: &str,
) -> std::result::Result<Option<T>, MemoryError> {
    match memory.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| MemoryError::Serialization {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Key scheme and retention windows.
///
/// Every inter-stage key carries the pipeline run id so concurrent runs
/// never overwrite each other's intermediate results.
pub mod keys {
    use std::time::Duration;

    pub const PATTERN: &str = "pattern";
    pub const PATTERN_CANDIDATES: &str = "pattern-candidates";
    pub const GRAPH_INSIGHTS: &str = "graph-insights";
    pub const WORKFLOW: &str = "workflow";
    pub const VALIDATION: &str = "validation";

    pub const PATTERN_TTL: Duration = Duration::from_secs(5 * 60);
    pub const GRAPH_INSIGHTS_TTL: Duration = Duration::from_secs(5 * 60);
    pub const WORKFLOW_TTL: Duration = Duration::from_secs(10 * 60);
    pub const VALIDATION_TTL: Duration = Duration::from_secs(10 * 60);
    pub const TASK_TTL: Duration = Duration::from_secs(60 * 60);

    /// `run:<run_id>:<stage>`
    pub fn run(run_id: &str, stage: &str) -> String {
        format!("run:{run_id}:{stage}")
    }

    /// Glob matching every key of one run.
    pub fn run_glob(run_id: &str) -> String {
        format!("run:{run_id}:*")
    }

    /// `task:<agent_id>:<task_id>`
    pub fn task(agent_id: &str, task_id: &str) -> String {
        format!("task:{agent_id}:{task_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ttl_ms: Option<u64>) -> MemoryEntry {
        MemoryEntry {
            key: "k".into(),
            value: serde_json::json!(1),
            agent_id: "a".into(),
            created_at: Utc::now(),
            ttl_ms,
        }
    }

    #[test]
    fn entry_without_ttl_never_expires() {
        let e = entry(None);
        assert!(e.expires_at().is_none());
        assert!(!e.is_expired_at(Utc::now() + chrono::Duration::days(365)));
    }

    #[test]
    fn entry_expires_at_ttl_boundary() {
        let e = entry(Some(1_000));
        let at = e.expires_at().unwrap();
        assert!(!e.is_expired_at(at - chrono::Duration::milliseconds(1)));
        assert!(e.is_expired_at(at));
    }

    #[test]
    fn huge_ttl_never_expires() {
        let e = entry(Some(i64::MAX as u64 / 2));
        assert!(e.expires_at().is_none());
        assert!(!e.is_expired());

        let e = entry(Some(u64::MAX));
        assert!(e.expires_at().is_none());
        assert!(!e.is_expired_at(Utc::now() + chrono::Duration::days(365 * 1000)));
    }

    #[test]
    fn saturating_millis_clamps() {
        assert_eq!(saturating_millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(saturating_millis(Duration::from_secs(u64::MAX)), u64::MAX);
        let q = MemoryQuery::default().max_age(Duration::from_secs(u64::MAX));
        assert_eq!(q.max_age_ms, Some(u64::MAX));
    }

    #[test]
    fn run_keys_are_scoped() {
        assert_eq!(keys::run("r1", keys::PATTERN), "run:r1:pattern");
        assert_eq!(keys::run_glob("r1"), "run:r1:*");
        assert_eq!(keys::task("validator", "t9"), "task:validator:t9");
    }

    #[test]
    fn query_builder_sets_fields() {
        let q = MemoryQuery::pattern("run:*")
            .by_agent("pattern")
            .max_age(Duration::from_secs(2));
        assert_eq!(q.pattern.as_deref(), Some("run:*"));
        assert_eq!(q.agent_id.as_deref(), Some("pattern"));
        assert_eq!(q.max_age_ms, Some(2_000));
    }
}
