//! Optional AI review layer.
//!
//! Generation output is untrusted text. It is parsed into a tagged
//! [`SemanticReview`]; any failure along the way (provider unavailable,
//! deadline, transport error, unparseable reply) skips the layer.
//! Findings only ever become warnings.

use super::result::{ValidationWarning, WarningKind};
use super::rules::WorkflowSummary;
use flowsmith_core::provider::{Provider, ProviderRequest};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const REVIEW_SYSTEM_PROMPT: &str = "You review automation workflows for problems. \
Reply with a JSON array only, no prose. Each element is an object with the fields \
\"category\" (one of \"logic\", \"error_handling\", \"performance\", \"security\"), \
\"message\" (one sentence), and optionally \"node\" (the affected node name). \
Reply with [] when there is nothing to report.";

const REVIEW_MAX_TOKENS: u32 = 1024;

/// Outcome of parsing a review reply.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticReview {
    Parsed(Vec<ValidationWarning>),
    ParseError(String),
}

#[derive(Deserialize)]
struct Finding {
    #[serde(default, alias = "type")]
    category: Option<String>,
    message: String,
    #[serde(default)]
    node: Option<String>,
    #[serde(default)]
    suggestion: Option<String>,
}

/// The user prompt sent for one workflow.
pub fn build_review_prompt(summary: &WorkflowSummary) -> String {
    let body = serde_json::to_string_pretty(summary).unwrap_or_default();
    format!(
        "Review this workflow for logical-flow issues, missing error handling, \
performance problems and security concerns.\n\nWorkflow:\n{body}"
    )
}

/// Parse a reply into warnings, tolerating code fences and surrounding prose.
pub fn parse_review(text: &str) -> SemanticReview {
    let trimmed = text.trim();
    let candidate = match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => return SemanticReview::ParseError("reply contains no JSON array".into()),
    };

    match serde_json::from_str::<Vec<Finding>>(candidate) {
        Ok(findings) => SemanticReview::Parsed(
            findings
                .into_iter()
                .filter(|f| !f.message.trim().is_empty())
                .map(|f| ValidationWarning {
                    kind: WarningKind::Semantic,
                    message: match f.category {
                        Some(category) => format!("{category}: {}", f.message.trim()),
                        None => f.message.trim().to_string(),
                    },
                    node: f.node,
                    suggestion: f.suggestion,
                })
                .collect(),
        ),
        Err(e) => SemanticReview::ParseError(e.to_string()),
    }
}

/// Runs the review against a generation provider under its own deadline.
pub struct SemanticReviewer {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl SemanticReviewer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            timeout,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// `None` when the layer is skipped.
    pub async fn review(&self, summary: &WorkflowSummary, cancel: &CancellationToken) -> Option<SemanticReview> {
        self.review_by(summary, cancel, None).await
    }

    /// Like [`review`](Self::review), but gives up at `deadline` when that
    /// comes before the reviewer's own timeout.
    pub async fn review_by(
        &self,
        summary: &WorkflowSummary,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Option<SemanticReview> {
        let timeout = deadline.map_or(self.timeout, |at| {
            self.timeout.min(at.saturating_duration_since(Instant::now()))
        });
        if timeout.is_zero() {
            debug!("Semantic review skipped: no time left before the stage deadline");
            return None;
        }

        if !self.provider.is_available().await {
            debug!(provider = self.provider.name(), "Semantic review skipped: provider unavailable");
            return None;
        }

        let mut request = ProviderRequest::new(self.model.clone(), build_review_prompt(summary))
            .with_system(REVIEW_SYSTEM_PROMPT);
        request.max_tokens = Some(REVIEW_MAX_TOKENS);
        request.temperature = self.temperature;

        let call = tokio::time::timeout(timeout, self.provider.generate(request));
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Semantic review cancelled");
                return None;
            }
            outcome = call => outcome,
        };

        match outcome {
            Ok(Ok(response)) => Some(parse_review(&response.text)),
            Ok(Err(e)) => {
                warn!(error = %e, "Semantic review failed; skipping");
                None
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Semantic review timed out; skipping");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeClass;
    use crate::test_helpers::MockProvider;
    use crate::validator::rules::NodeSummary;

    fn summary() -> WorkflowSummary {
        WorkflowSummary {
            name: "t".into(),
            nodes: vec![NodeSummary {
                name: "Hook".into(),
                node_type: "n8n-nodes-base.webhook".into(),
                class: NodeClass::Trigger,
            }],
            edges: vec![],
            trigger_count: 1,
            action_count: 0,
        }
    }

    #[test]
    fn parses_plain_array() {
        let review = parse_review(r#"[{"category": "security", "message": "Webhook has no auth", "node": "Hook"}]"#);
        let SemanticReview::Parsed(warnings) = review else {
            panic!("expected parsed review");
        };
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::Semantic);
        assert_eq!(warnings[0].message, "security: Webhook has no auth");
        assert_eq!(warnings[0].node.as_deref(), Some("Hook"));
    }

    #[test]
    fn tolerates_fences_and_prose() {
        let text = "Here you go:\n```json\n[{\"type\": \"performance\", \"message\": \"Batch the requests\"}]\n```\nThanks";
        assert!(matches!(parse_review(text), SemanticReview::Parsed(w) if w.len() == 1));
    }

    #[test]
    fn accepts_object_wrapper_and_empty_list() {
        let wrapped = r#"{"warnings": [{"message": "No error branch"}]}"#;
        assert!(matches!(parse_review(wrapped), SemanticReview::Parsed(w) if w[0].message == "No error branch"));
        assert_eq!(parse_review("[]"), SemanticReview::Parsed(vec![]));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(parse_review("looks fine to me"), SemanticReview::ParseError(_)));
        assert!(matches!(parse_review("[not json]"), SemanticReview::ParseError(_)));
        assert!(matches!(parse_review(r#"[{"category": "logic"}]"#), SemanticReview::ParseError(_)));
    }

    #[test]
    fn prompt_contains_node_summary() {
        let prompt = build_review_prompt(&summary());
        assert!(prompt.contains("n8n-nodes-base.webhook"));
        assert!(prompt.contains("error handling"));
    }

    #[tokio::test]
    async fn unavailable_provider_skips() {
        let reviewer = SemanticReviewer::new(Arc::new(MockProvider::unavailable()), "m", Duration::from_secs(1));
        assert!(reviewer.review(&summary(), &CancellationToken::new()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let provider = Arc::new(
            MockProvider::new()
                .with_response("[]")
                .with_delay(Duration::from_secs(30)),
        );
        let reviewer = SemanticReviewer::new(provider, "m", Duration::from_millis(100));
        assert!(reviewer.review(&summary(), &CancellationToken::new()).await.is_none());
    }

    #[tokio::test]
    async fn successful_review_sends_system_prompt() {
        let provider = Arc::new(MockProvider::new().with_response(r#"[{"message": "ok"}]"#));
        let reviewer = SemanticReviewer::new(provider.clone(), "review-model", Duration::from_secs(1));
        let review = reviewer.review(&summary(), &CancellationToken::new()).await;
        assert!(matches!(review, Some(SemanticReview::Parsed(w)) if w.len() == 1));

        let request = provider.last_request().unwrap();
        assert_eq!(request.model, "review-model");
        assert_eq!(request.system.as_deref(), Some(REVIEW_SYSTEM_PROMPT));
    }
}
