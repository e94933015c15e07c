//! Pattern descriptors and the matches produced against a goal.

use serde::{Deserialize, Serialize};

/// Rough size of the workflow a pattern produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    #[default]
    Simple,
    Medium,
    Complex,
}

impl Complexity {
    /// Tier for a workflow of the given size: ≤3 simple, ≤10 medium.
    pub fn from_node_count(count: usize) -> Self {
        match count {
            0..=3 => Complexity::Simple,
            4..=10 => Complexity::Medium,
            _ => Complexity::Complex,
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Complexity::Simple => "simple",
            Complexity::Medium => "medium",
            Complexity::Complex => "complex",
        };
        f.write_str(s)
    }
}

/// A reusable template descriptor mapping goals onto a workflow shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub suggested_nodes: Vec<String>,
    #[serde(default)]
    pub complexity: Complexity,
}

impl Pattern {
    /// Text used to build the pattern's embedding.
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {}",
            self.name,
            self.description,
            self.keywords.join(" ")
        )
    }
}

/// A scored candidate pattern for one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern_id: String,
    pub pattern_name: String,
    pub description: String,
    /// In `[0, 1]`.
    pub confidence: f32,
    /// Empty when produced by semantic matching.
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub suggested_nodes: Vec<String>,
    pub complexity: Complexity,
}

impl PatternMatch {
    pub fn from_pattern(pattern: &Pattern, confidence: f32, matched_keywords: Vec<String>) -> Self {
        Self {
            pattern_id: pattern.id.clone(),
            pattern_name: pattern.name.clone(),
            description: pattern.description.clone(),
            confidence: confidence.clamp(0.0, 1.0),
            matched_keywords,
            suggested_nodes: pattern.suggested_nodes.clone(),
            complexity: pattern.complexity,
        }
    }
}
