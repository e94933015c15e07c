//! No-op provider — the capability is absent.
//!
//! Every consumer probes availability first, so this only ever reports
//! `false` and refuses calls.

use async_trait::async_trait;
use flowsmith_core::error::ProviderError;
use flowsmith_core::provider::{Provider, ProviderRequest, ProviderResponse};

pub struct NoopProvider;

#[async_trait]
impl Provider for NoopProvider {
    fn name(&self) -> &str {
        "none"
    }

    async fn is_available(&self) -> bool {
        false
    }

    async fn generate(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "no generation provider configured".into(),
        ))
    }
}
