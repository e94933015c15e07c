//! Background catalog sync for Flowsmith.
//!
//! [`GraphUpdateLoop`] polls the automation platform's node catalog on a
//! jittered schedule and feeds incremental deltas to the knowledge graph.

pub mod catalog;
pub mod store;
pub mod update_loop;

pub use catalog::{CatalogMap, CatalogSnapshot, diff, fingerprint, normalize};
pub use store::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore};
pub use update_loop::{GraphUpdateLoop, SyncHandle, TickOutcome};
