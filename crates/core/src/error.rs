//! Error types for the Flowsmith domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Flowsmith operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Automation platform errors ---
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    // --- Knowledge graph errors ---
    #[error("Knowledge graph error: {0}")]
    Graph(#[from] GraphError),

    // --- Shared memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Agent errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the generation/embedding capability.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures talking to the remote automation platform.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("Platform request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Platform authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid platform response: {0}")]
    InvalidResponse(String),
}

/// Failures of the knowledge-graph bridge.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    #[error("Knowledge graph unavailable: {0}")]
    Unavailable(String),

    #[error("Graph query failed: {0}")]
    QueryFailed(String),

    #[error("Graph update failed: {0}")]
    UpdateFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid key pattern: {0}")]
    InvalidPattern(String),

    #[error("Serialization failed for key {key}: {reason}")]
    Serialization { key: String, reason: String },
}

/// Failures raised inside an agent's `execute`.
///
/// These never cross an agent boundary as errors; the runner converts
/// them into a failed [`AgentOutput`](crate::agent::AgentOutput).
/// Catalog sync errors. Every variant is tick-scoped: the loop logs it
/// and keeps scheduling.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("Catalog fetch failed: {0}")]
    Fetch(#[from] PlatformError),

    #[error("Graph update failed: {0}")]
    Apply(#[from] GraphError),

    #[error("Snapshot store error: {0}")]
    Snapshot(String),

    #[error("Catalog serialization failed: {0}")]
    Serialization(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent {agent_id} is already running")]
    AlreadyRunning { agent_id: String },

    #[error("Agent {agent_id} timed out after {timeout_ms}ms")]
    Timeout { agent_id: String, timeout_ms: u64 },

    #[error("Agent {agent_id} was cancelled")]
    Cancelled { agent_id: String },

    #[error("Missing upstream output '{key}': upstream stage must run first")]
    MissingUpstream { key: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No pattern matched the goal")]
    NoPatternMatch,

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
