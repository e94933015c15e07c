//! Shared memory and knowledge-graph implementations for Flowsmith.

pub mod in_memory;
pub mod graph;
pub mod vector;

pub use in_memory::InMemorySharedMemory;
pub use graph::InMemoryKnowledgeGraph;
pub use vector::{cosine_similarity, rank_above};
