//! External collaborator clients for Flowsmith.
//!
//! - Generation/embedding providers implement `flowsmith_core::Provider`
//! - The platform client implements `flowsmith_core::AutomationPlatform`
//! - The graph bridge implements `flowsmith_core::KnowledgeGraph`
//!
//! [`build_provider`] selects the provider from configuration.

pub mod graph_bridge;
pub mod noop;
pub mod openai_compat;
pub mod platform;

pub use graph_bridge::HttpGraphBridge;
pub use noop::NoopProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use platform::RestPlatformClient;

use flowsmith_core::provider::Provider;
use std::sync::Arc;

/// Build the generation/embedding provider from configuration.
///
/// Falls back to [`NoopProvider`] when the kind is `none` or no API key is
/// available; consumers then run without semantic features.
pub fn build_provider(config: &flowsmith_config::ProviderConfig) -> Arc<dyn Provider> {
    match (config.kind.as_str(), &config.api_key) {
        ("openai", Some(key)) => {
            let mut provider = OpenAiCompatProvider::new("openai", &config.base_url, key.clone());
            if let Some(model) = &config.embedding_model {
                provider = provider.with_embedding_model(model.clone());
            }
            Arc::new(provider)
        }
        ("openai", None) => {
            tracing::warn!("provider.kind is 'openai' but no API key is set; semantic features disabled");
            Arc::new(NoopProvider)
        }
        _ => Arc::new(NoopProvider),
    }
}
