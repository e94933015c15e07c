//! # Flowsmith Core
//!
//! Domain types, traits, and error definitions for the Flowsmith workflow
//! synthesis pipeline. This crate performs **no I/O** — it defines the
//! domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping backends via configuration (real HTTP clients vs. in-memory)
//! - Testing agents and the orchestrator with scripted mocks
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod workflow;
pub mod pattern;
pub mod provider;
pub mod platform;
pub mod graph;
pub mod memory;
pub mod agent;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use workflow::{ConnectionTarget, Node, NodeConnections, Workflow};
pub use pattern::{Complexity, Pattern, PatternMatch};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use platform::{AutomationPlatform, NodeTypeDescriptor};
pub use graph::{CatalogDelta, CatalogEntry, GraphInsights, GraphQuery, KnowledgeGraph};
pub use memory::{keys, MemoryEntry, MemoryQuery, SharedMemory};
pub use agent::{Agent, AgentConfig, AgentInput, AgentOutput, AgentRole, TaskRecord, TaskStatus};
pub use event::{DomainEvent, EventBus, EventEnvelope};

pub use tokio_util::sync::CancellationToken;
