//! In-memory shared memory — the default blackboard, one per orchestrator.

use async_trait::async_trait;
use chrono::Utc;
use flowsmith_core::error::MemoryError;
use flowsmith_core::memory::{MemoryEntry, MemoryQuery, SharedMemory, saturating_millis};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// A TTL-aware key/value store held in a `HashMap`.
///
/// Expired entries are filtered out of every read and reclaimed lazily
/// (on overwrite, delete, or [`SharedMemory::purge_expired`]).
pub struct InMemorySharedMemory {
    entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl InMemorySharedMemory {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored entries, expired ones included.
    pub async fn raw_len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for InMemorySharedMemory {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile a `*` glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<regex_lite::Regex, MemoryError> {
    let body = pattern
        .split('*')
        .map(regex_lite::escape)
        .collect::<Vec<_>>()
        .join(".*");
    regex_lite::Regex::new(&format!("^{body}$"))
        .map_err(|e| MemoryError::InvalidPattern(format!("{pattern}: {e}")))
}

#[async_trait]
impl SharedMemory for InMemorySharedMemory {
    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        writer: &str,
        ttl: Option<Duration>,
    ) -> Result<(), MemoryError> {
        let entry = MemoryEntry {
            key: key.to_string(),
            value,
            agent_id: writer.to_string(),
            created_at: Utc::now(),
            ttl_ms: ttl.map(saturating_millis),
        };
        debug!(key, writer, ttl_ms = ?entry.ttl_ms, "Shared memory set");
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, MemoryError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str, requester: &str) -> Result<bool, MemoryError> {
        let removed = self.entries.write().await.remove(key);
        let live = removed.is_some_and(|e| !e.is_expired());
        debug!(key, requester, removed = live, "Shared memory delete");
        Ok(live)
    }

    async fn query(&self, query: &MemoryQuery) -> Result<Vec<MemoryEntry>, MemoryError> {
        let matcher = query.pattern.as_deref().map(glob_to_regex).transpose()?;
        let now = Utc::now();
        let entries = self.entries.read().await;

        let mut results: Vec<MemoryEntry> = entries
            .values()
            .filter(|e| !e.is_expired_at(now))
            .filter(|e| matcher.as_ref().is_none_or(|re| re.is_match(&e.key)))
            .filter(|e| query.agent_id.as_ref().is_none_or(|a| &e.agent_id == a))
            .filter(|e| {
                query.max_age_ms.is_none_or(|max| {
                    let max = i64::try_from(max).unwrap_or(i64::MAX);
                    (now - e.created_at).num_milliseconds() <= max
                })
            })
            .cloned()
            .collect();

        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }

    async fn agent_memory(
        &self,
        agent_id: &str,
    ) -> Result<HashMap<String, serde_json::Value>, MemoryError> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|e| e.agent_id == agent_id && !e.is_expired())
            .map(|e| (e.key.clone(), e.value.clone()))
            .collect())
    }

    async fn clear_agent_memory(&self, agent_id: &str) -> Result<usize, MemoryError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.agent_id != agent_id);
        let removed = before - entries.len();
        debug!(agent_id, removed, "Cleared agent memory");
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<usize, MemoryError> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired_at(now));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SHORT: Duration = Duration::from_millis(20);

    async fn wait_past(ttl: Duration) {
        tokio::time::sleep(ttl * 3).await;
    }

    #[tokio::test]
    async fn set_and_get() {
        let mem = InMemorySharedMemory::new();
        mem.set("run:r1:pattern", json!({"id": "p"}), "pattern", None)
            .await
            .unwrap();
        let value = mem.get("run:r1:pattern").await.unwrap();
        assert_eq!(value, Some(json!({"id": "p"})));
        assert!(mem.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_write_wins() {
        let mem = InMemorySharedMemory::new();
        mem.set("k", json!(1), "a", None).await.unwrap();
        mem.set("k", json!(2), "b", None).await.unwrap();
        assert_eq!(mem.get("k").await.unwrap(), Some(json!(2)));

        let entries = mem.query(&MemoryQuery::pattern("k")).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].agent_id, "b");
    }

    #[tokio::test]
    async fn expired_entries_are_invisible() {
        let mem = InMemorySharedMemory::new();
        mem.set("short", json!("x"), "a", Some(SHORT)).await.unwrap();
        mem.set("long", json!("y"), "a", None).await.unwrap();
        wait_past(SHORT).await;

        assert!(mem.get("short").await.unwrap().is_none());
        let all = mem.query(&MemoryQuery::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].key, "long");
        assert!(!mem.agent_memory("a").await.unwrap().contains_key("short"));
        assert!(!mem.delete("short", "a").await.unwrap());
    }

    #[tokio::test]
    async fn purge_reclaims_expired_entries() {
        let mem = InMemorySharedMemory::new();
        mem.set("a", json!(1), "x", Some(SHORT)).await.unwrap();
        mem.set("b", json!(2), "x", Some(SHORT)).await.unwrap();
        mem.set("c", json!(3), "x", None).await.unwrap();
        wait_past(SHORT).await;

        assert_eq!(mem.raw_len().await, 3);
        assert_eq!(mem.purge_expired().await.unwrap(), 2);
        assert_eq!(mem.raw_len().await, 1);
    }

    #[tokio::test]
    async fn query_by_glob_agent_and_age() {
        let mem = InMemorySharedMemory::new();
        mem.set("run:r1:pattern", json!(1), "pattern", None).await.unwrap();
        mem.set("run:r1:workflow", json!(2), "workflow", None).await.unwrap();
        mem.set("run:r2:pattern", json!(3), "pattern", None).await.unwrap();
        mem.set("task:pattern:t1", json!(4), "pattern", None).await.unwrap();

        let r1 = mem.query(&MemoryQuery::pattern("run:r1:*")).await.unwrap();
        let keys: Vec<&str> = r1.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["run:r1:pattern", "run:r1:workflow"]);

        let patterns = mem
            .query(&MemoryQuery::pattern("run:*").by_agent("pattern"))
            .await
            .unwrap();
        assert_eq!(patterns.len(), 2);

        let fresh = mem
            .query(&MemoryQuery::default().max_age(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(fresh.len(), 4);
    }

    #[tokio::test]
    async fn max_age_excludes_older_entries() {
        let mem = InMemorySharedMemory::new();
        mem.set("run:r1:pattern", json!(1), "pattern", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        mem.set("run:r1:workflow", json!(2), "workflow", None).await.unwrap();

        let recent = mem
            .query(&MemoryQuery::default().max_age(Duration::from_millis(40)))
            .await
            .unwrap();
        let keys: Vec<&str> = recent.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["run:r1:workflow"]);

        let unbounded = mem
            .query(&MemoryQuery::default().max_age(Duration::from_secs(u64::MAX)))
            .await
            .unwrap();
        assert_eq!(unbounded.len(), 2);
    }

    #[tokio::test]
    async fn huge_ttl_keeps_entry_visible() {
        let mem = InMemorySharedMemory::new();
        mem.set("half", json!(1), "a", Some(Duration::from_millis(i64::MAX as u64 / 2)))
            .await
            .unwrap();
        mem.set("max", json!(2), "a", Some(Duration::from_secs(u64::MAX)))
            .await
            .unwrap();

        assert_eq!(mem.get("half").await.unwrap(), Some(json!(1)));
        assert_eq!(mem.get("max").await.unwrap(), Some(json!(2)));
        assert_eq!(mem.query(&MemoryQuery::default()).await.unwrap().len(), 2);
        assert_eq!(mem.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn glob_escapes_regex_metacharacters() {
        let mem = InMemorySharedMemory::new();
        mem.set("a.b", json!(1), "x", None).await.unwrap();
        mem.set("axb", json!(2), "x", None).await.unwrap();
        let hits = mem.query(&MemoryQuery::pattern("a.b")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "a.b");
    }

    #[tokio::test]
    async fn agent_memory_and_clear() {
        let mem = InMemorySharedMemory::new();
        mem.set("k1", json!(1), "validator", None).await.unwrap();
        mem.set("k2", json!(2), "validator", None).await.unwrap();
        mem.set("k3", json!(3), "pattern", None).await.unwrap();

        let own = mem.agent_memory("validator").await.unwrap();
        assert_eq!(own.len(), 2);
        assert_eq!(own["k1"], json!(1));

        assert_eq!(mem.clear_agent_memory("validator").await.unwrap(), 2);
        assert!(mem.get("k1").await.unwrap().is_none());
        assert_eq!(mem.get("k3").await.unwrap(), Some(json!(3)));
    }

    #[tokio::test]
    async fn any_agent_may_delete() {
        let mem = InMemorySharedMemory::new();
        mem.set("k", json!(1), "workflow", None).await.unwrap();
        assert!(mem.delete("k", "orchestrator").await.unwrap());
        assert!(!mem.delete("k", "orchestrator").await.unwrap());
    }
}
