//! The graph update loop.
//!
//! Each tick fetches the platform catalog, fingerprints it, and pushes only
//! the difference since the last applied snapshot to the knowledge graph.
//! The snapshot is saved after the graph accepts the delta, so a failed
//! apply is retried in full on the next tick.

use flowsmith_config::SyncConfig;
use flowsmith_core::error::SyncError;
use flowsmith_core::event::{DomainEvent, EventBus};
use flowsmith_core::graph::KnowledgeGraph;
use flowsmith_core::platform::AutomationPlatform;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{self, CatalogMap, CatalogSnapshot};
use crate::store::SnapshotStore;

const EVENT_SOURCE: &str = "graph-update-loop";

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub fingerprint: String,
    /// `false` when the fingerprint matched the stored snapshot
    pub changed: bool,
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub total_entries: usize,
}

impl TickOutcome {
    fn unchanged(fingerprint: String, total_entries: usize) -> Self {
        Self {
            fingerprint,
            changed: false,
            added: 0,
            modified: 0,
            removed: 0,
            total_entries,
        }
    }
}

/// Keeps a knowledge graph in step with the platform's node catalog.
#[derive(Clone)]
pub struct GraphUpdateLoop {
    platform: Arc<dyn AutomationPlatform>,
    graph: Arc<dyn KnowledgeGraph>,
    store: Arc<dyn SnapshotStore>,
    events: Option<Arc<EventBus>>,
    interval: Duration,
    jitter: Duration,
}

impl GraphUpdateLoop {
    pub fn new(
        platform: Arc<dyn AutomationPlatform>,
        graph: Arc<dyn KnowledgeGraph>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        let defaults = SyncConfig::default();
        Self {
            platform,
            graph,
            store,
            events: None,
            interval: Duration::from_secs(defaults.interval_secs),
            jitter: Duration::from_secs(defaults.jitter_secs),
        }
    }

    pub fn with_schedule(mut self, interval: Duration, jitter: Duration) -> Self {
        self.interval = interval;
        self.jitter = jitter;
        self
    }

    /// Interval and jitter from the `[sync]` config section.
    pub fn with_config(self, config: &SyncConfig) -> Self {
        self.with_schedule(
            Duration::from_secs(config.interval_secs),
            Duration::from_secs(config.jitter_secs),
        )
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    /// Run one sync pass.
    pub async fn tick(&self) -> Result<TickOutcome, SyncError> {
        let descriptors = self.platform.fetch_node_catalog().await?;
        let current = catalog::normalize(&descriptors);
        let fingerprint = catalog::fingerprint(&current)?;

        let previous = self.store.load().await?;
        if previous
            .as_ref()
            .is_some_and(|snapshot| snapshot.fingerprint == fingerprint)
        {
            debug!(fingerprint = %fingerprint, entries = current.len(), "Catalog unchanged");
            return Ok(TickOutcome::unchanged(fingerprint, current.len()));
        }

        let previous_map: CatalogMap = previous.map(|s| s.to_map()).unwrap_or_default();
        let delta = catalog::diff(&previous_map, &current);

        if !delta.is_empty() {
            self.graph.apply_update(&delta).await?;
        }

        self.store
            .save(&CatalogSnapshot::new(fingerprint.clone(), &current))
            .await?;

        let outcome = TickOutcome {
            fingerprint,
            changed: true,
            added: delta.added.len(),
            modified: delta.modified.len(),
            removed: delta.removed.len(),
            total_entries: current.len(),
        };

        info!(
            fingerprint = %outcome.fingerprint,
            added = outcome.added,
            modified = outcome.modified,
            removed = outcome.removed,
            total = outcome.total_entries,
            "Catalog synced"
        );

        if let Some(events) = &self.events {
            events.publish(
                EVENT_SOURCE,
                DomainEvent::CatalogSynced {
                    fingerprint: outcome.fingerprint.clone(),
                    added: outcome.added,
                    modified: outcome.modified,
                    removed: outcome.removed,
                },
            );
        }

        Ok(outcome)
    }

    /// Delay before the next tick: the interval plus up to `jitter`.
    pub fn next_delay(&self) -> Duration {
        jittered(self.interval, self.jitter)
    }

    /// Spawn the loop. The first tick runs immediately; a failed tick is
    /// logged and the loop keeps its schedule.
    pub fn start(&self) -> SyncHandle {
        let this = self.clone();
        let token = CancellationToken::new();
        let cancel = token.clone();

        let join = tokio::spawn(async move {
            info!(
                interval_secs = this.interval.as_secs(),
                jitter_secs = this.jitter.as_secs(),
                "Graph update loop started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = this.tick() => {
                        if let Err(e) = result {
                            warn!(error = %e, "Catalog sync tick failed");
                        }
                    }
                }

                let delay = this.next_delay();
                debug!(delay_ms = delay.as_millis() as u64, "Next catalog sync scheduled");

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            info!("Graph update loop stopped");
        });

        SyncHandle { token, join }
    }
}

pub(crate) fn jittered(interval: Duration, jitter: Duration) -> Duration {
    let max_ms = jitter.as_millis() as u64;
    if max_ms == 0 {
        return interval;
    }
    let mut rng = rand::rng();
    interval + Duration::from_millis(rng.random_range(0..=max_ms))
}

/// Control handle for a running loop.
pub struct SyncHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl SyncHandle {
    /// Stop scheduling and wait for the loop task to exit. An in-flight
    /// tick is abandoned before its snapshot is saved.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "Graph update loop task ended abnormally");
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
