//! Pattern agent — maps a free-text goal onto ranked candidate patterns.
//!
//! Two strategies, tried in order:
//!
//! 1. **Semantic**: cosine similarity between the goal's keyword embedding
//!    and each pattern's pre-computed embedding (only when the provider
//!    supports embeddings). Scores strictly above 0.30 are kept.
//! 2. **Keyword**: inverted-index lookup, +0.20 per distinct matching
//!    keyword (capped at 1.0). Patterns reaching 0.20 are kept.
//!
//! An empty semantic result falls through to keyword matching. The top
//! match is written to shared memory for the workflow stage.

pub mod keywords;
pub mod library;

pub use keywords::{extract_keywords, stem};
pub use library::{builtin_patterns, load_patterns_file, merge_patterns};

use async_trait::async_trait;
use flowsmith_core::agent::{Agent, AgentConfig, AgentInput};
use flowsmith_core::error::AgentError;
use flowsmith_core::memory::{self, SharedMemory, keys};
use flowsmith_core::pattern::{Pattern, PatternMatch};
use flowsmith_core::provider::{EmbeddingRequest, Provider};
use flowsmith_memory::rank_above;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Minimum cosine similarity (exclusive) for a semantic match.
pub const SEMANTIC_THRESHOLD: f32 = 0.30;

/// Confidence added per distinct matching keyword.
pub const KEYWORD_WEIGHT: f32 = 0.20;

/// Minimum accumulated confidence for a keyword match.
pub const MIN_KEYWORD_CONFIDENCE: f32 = 0.20;

/// Where a set of matches came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Semantic,
    Keyword,
}

struct SemanticIndex {
    provider: Arc<dyn Provider>,
    model: String,
    /// (pattern index, embedding), in library order.
    embeddings: Vec<(usize, Vec<f32>)>,
}

pub struct PatternAgent {
    config: AgentConfig,
    patterns: Vec<Pattern>,
    /// Stemmed keyword → pattern indices, in library order.
    index: HashMap<String, Vec<usize>>,
    semantic: Option<SemanticIndex>,
    memory: Arc<dyn SharedMemory>,
}

impl PatternAgent {
    /// Build the agent and its keyword index. Patterns are fixed from here on.
    pub fn new(config: AgentConfig, patterns: Vec<Pattern>, memory: Arc<dyn SharedMemory>) -> Self {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, pattern) in patterns.iter().enumerate() {
            for keyword in &pattern.keywords {
                for token in keyword.to_lowercase().split_whitespace() {
                    let ids = index.entry(stem(token)).or_default();
                    if ids.last() != Some(&i) {
                        ids.push(i);
                    }
                }
            }
        }
        debug!(patterns = patterns.len(), keywords = index.len(), "Pattern index built");

        Self {
            config,
            patterns,
            index,
            semantic: None,
            memory,
        }
    }

    /// Pre-compute pattern embeddings so semantic matching is available.
    ///
    /// If the provider cannot embed, or the batch call fails, the agent
    /// stays keyword-only.
    pub async fn with_embeddings(mut self, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        if !provider.supports_embeddings().await {
            debug!(provider = provider.name(), "Embeddings unavailable; keyword matching only");
            return self;
        }

        let model = model.into();
        let request = EmbeddingRequest {
            model: model.clone(),
            inputs: self.patterns.iter().map(Pattern::embedding_text).collect(),
        };

        match provider.embed(request).await {
            Ok(response) if response.embeddings.len() == self.patterns.len() => {
                info!(count = self.patterns.len(), model = %model, "Pattern embeddings ready");
                self.semantic = Some(SemanticIndex {
                    provider,
                    model,
                    embeddings: response.embeddings.into_iter().enumerate().collect(),
                });
            }
            Ok(response) => warn!(
                expected = self.patterns.len(),
                got = response.embeddings.len(),
                "Embedding count mismatch; keyword matching only"
            ),
            Err(e) => warn!(error = %e, "Pattern embedding failed; keyword matching only"),
        }
        self
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn has_semantic_index(&self) -> bool {
        self.semantic.is_some()
    }

    /// Keyword/inverted-index matching.
    pub fn keyword_matches(&self, goal: &str) -> Vec<PatternMatch> {
        // Keyed by library position so equal scores keep library order.
        let mut scores: BTreeMap<usize, (f32, Vec<String>)> = BTreeMap::new();
        for keyword in extract_keywords(goal) {
            let Some(ids) = self.index.get(&keyword) else {
                continue;
            };
            for &i in ids {
                let (confidence, matched) = scores.entry(i).or_insert((0.0, Vec::new()));
                *confidence = (*confidence + KEYWORD_WEIGHT).min(1.0);
                matched.push(keyword.clone());
            }
        }

        let mut matches: Vec<PatternMatch> = scores
            .into_iter()
            .filter(|(_, (confidence, _))| *confidence >= MIN_KEYWORD_CONFIDENCE)
            .map(|(i, (confidence, matched))| {
                PatternMatch::from_pattern(&self.patterns[i], confidence, matched)
            })
            .collect();
        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        matches
    }

    /// Embedding similarity matching. Empty when no semantic index exists.
    pub async fn semantic_matches(
        &self,
        goal: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PatternMatch>, AgentError> {
        let Some(semantic) = &self.semantic else {
            return Ok(Vec::new());
        };
        let keywords = extract_keywords(goal);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: semantic.model.clone(),
            inputs: vec![keywords.join(" ")],
        };
        let response = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(AgentError::Cancelled { agent_id: self.config.id.clone() });
            }
            response = semantic.provider.embed(request) => response?,
        };
        let Some(query) = response.embeddings.into_iter().next() else {
            return Ok(Vec::new());
        };

        let ranked = rank_above(
            semantic.embeddings.iter().map(|(i, v)| (i, v.as_slice())),
            &query,
            SEMANTIC_THRESHOLD,
        );
        Ok(ranked
            .into_iter()
            .map(|(i, score)| PatternMatch::from_pattern(&self.patterns[*i], score, Vec::new()))
            .collect())
    }

    /// Semantic first, keyword on an empty or failed semantic pass.
    pub async fn find_matches(
        &self,
        goal: &str,
        cancel: &CancellationToken,
    ) -> Result<(Vec<PatternMatch>, MatchStrategy), AgentError> {
        if self.semantic.is_some() {
            match self.semantic_matches(goal, cancel).await {
                Ok(matches) if !matches.is_empty() => return Ok((matches, MatchStrategy::Semantic)),
                Ok(_) => debug!("No semantic match; falling back to keywords"),
                Err(e @ AgentError::Cancelled { .. }) => return Err(e),
                Err(e) => warn!(error = %e, "Semantic matching failed; falling back to keywords"),
            }
        }
        Ok((self.keyword_matches(goal), MatchStrategy::Keyword))
    }
}

#[async_trait]
impl Agent for PatternAgent {
    type Output = Vec<PatternMatch>;

    fn config(&self) -> &AgentConfig {
        &self.config
    }

    async fn execute(
        &self,
        input: &AgentInput,
        cancel: CancellationToken,
    ) -> Result<Vec<PatternMatch>, AgentError> {
        let (matches, strategy) = self.find_matches(&input.goal, &cancel).await?;
        let Some(top) = matches.first() else {
            info!(run_id = %input.run_id, "No pattern matched");
            return Err(AgentError::NoPatternMatch);
        };

        info!(
            run_id = %input.run_id,
            pattern = %top.pattern_id,
            confidence = top.confidence,
            candidates = matches.len(),
            strategy = ?strategy,
            "Pattern discovered"
        );

        let writer = self.config.id.as_str();
        memory::set_typed(
            self.memory.as_ref(),
            &keys::run(&input.run_id, keys::PATTERN),
            top,
            writer,
            Some(keys::PATTERN_TTL),
        )
        .await?;
        memory::set_typed(
            self.memory.as_ref(),
            &keys::run(&input.run_id, keys::PATTERN_CANDIDATES),
            &matches,
            writer,
            Some(keys::PATTERN_TTL),
        )
        .await?;

        Ok(matches)
    }

    fn resource_units(&self, output: &Vec<PatternMatch>) -> Option<u64> {
        Some(output.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockProvider;
    use flowsmith_core::agent::AgentRole;
    use flowsmith_memory::InMemorySharedMemory;

    fn agent() -> (PatternAgent, Arc<dyn SharedMemory>) {
        let mem: Arc<dyn SharedMemory> = Arc::new(InMemorySharedMemory::new());
        let config = AgentConfig::new("pattern", "Pattern Agent", AgentRole::PatternDiscovery);
        (PatternAgent::new(config, builtin_patterns(), mem.clone()), mem)
    }

    /// Two-dimensional embedding: (mentions slack, mentions email).
    fn toy_embedding(text: &str) -> Vec<f32> {
        let t = text.to_lowercase();
        vec![
            if t.contains("slack") { 1.0 } else { 0.0 },
            if t.contains("email") { 1.0 } else { 0.0 },
        ]
    }

    #[test]
    fn slack_database_goal_matches_slack_notification() {
        let (agent, _) = agent();
        let matches = agent.keyword_matches("send a slack alert when a database row changes");
        let top = &matches[0];
        assert_eq!(top.pattern_id, "slack-notification");
        assert!(top.confidence >= 0.2);
        assert!(top.matched_keywords.contains(&"slack".to_string()));
        assert!(top.matched_keywords.contains(&"database".to_string()));
    }

    #[test]
    fn keyword_confidence_accumulates_and_caps() {
        let (agent, _) = agent();
        let single = agent.keyword_matches("slack");
        assert_eq!(single[0].pattern_id, "slack-notification");
        assert!((single[0].confidence - 0.2).abs() < 1e-6);

        let many = agent.keyword_matches("slack alert notification message channel send database");
        assert_eq!(many[0].confidence, 1.0);
    }

    #[test]
    fn matches_are_sorted_descending_with_library_order_ties() {
        let (agent, _) = agent();
        // "alert" hits slack-notification and error-alerting equally.
        let matches = agent.keyword_matches("alert");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].pattern_id, "slack-notification");
        assert_eq!(matches[1].pattern_id, "error-alerting");

        let matches = agent.keyword_matches("error alert");
        assert_eq!(matches[0].pattern_id, "error-alerting");
        assert!(matches.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn unrelated_goal_has_no_matches() {
        let (agent, _) = agent();
        assert!(agent.keyword_matches("quantum entanglement").is_empty());
    }

    #[tokio::test]
    async fn execute_writes_top_match_to_shared_memory() {
        let (agent, mem) = agent();
        let input = AgentInput::new("r1", "post slack message on database change");
        let matches = agent.execute(&input, CancellationToken::new()).await.unwrap();

        let stored: PatternMatch = memory::get_typed(mem.as_ref(), "run:r1:pattern")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, matches[0]);

        let candidates: Vec<PatternMatch> = memory::get_typed(mem.as_ref(), "run:r1:pattern-candidates")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidates.len(), matches.len());
    }

    #[tokio::test]
    async fn execute_without_match_is_an_error() {
        let (agent, mem) = agent();
        let input = AgentInput::new("r1", "the of and");
        let err = agent.execute(&input, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::NoPatternMatch));
        assert!(mem.get("run:r1:pattern").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn semantic_matching_preferred_when_available() {
        let (agent, _) = agent();
        let provider = Arc::new(MockProvider::new().with_embedder(toy_embedding));
        let agent = agent.with_embeddings(provider, "toy").await;
        assert!(agent.has_semantic_index());

        let (matches, strategy) = agent
            .find_matches("post to slack", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(strategy, MatchStrategy::Semantic);
        assert_eq!(matches[0].pattern_id, "slack-notification");
        assert!(matches[0].matched_keywords.is_empty());
        assert!(matches.iter().all(|m| m.confidence > SEMANTIC_THRESHOLD));
    }

    #[tokio::test]
    async fn empty_semantic_result_falls_through_to_keywords() {
        let (agent, _) = agent();
        let provider = Arc::new(MockProvider::new().with_embedder(toy_embedding));
        let agent = agent.with_embeddings(provider, "toy").await;

        let (matches, strategy) = agent
            .find_matches("backup files to s3", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(strategy, MatchStrategy::Keyword);
        assert_eq!(matches[0].pattern_id, "file-backup");
    }

    #[tokio::test]
    async fn provider_without_embeddings_stays_keyword_only() {
        let (agent, _) = agent();
        let agent = agent.with_embeddings(Arc::new(MockProvider::unavailable()), "toy").await;
        assert!(!agent.has_semantic_index());
    }
}
