//! Validation verdict types.

use flowsmith_core::pattern::Complexity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        })
    }
}

/// Which family of check raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Shape problems that block acceptance outright.
    Structural,
    /// A required or well-typed node field is wrong.
    Node,
    /// A connection names a node that does not exist.
    Reference,
    /// No entry point, or nothing to do.
    Topology,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

/// Which family of check raised a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Structural,
    UnknownNodeType,
    Orphan,
    Topology,
    Compliance,
    Semantic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub kind: WarningKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationStatistics {
    pub trigger_count: usize,
    pub action_count: usize,
    pub connected_nodes: usize,
    pub orphaned_nodes: usize,
    pub complexity: Complexity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub node_count: usize,
    pub connection_count: usize,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub statistics: ValidationStatistics,
}

impl ValidationResult {
    pub(crate) fn error(&mut self, severity: Severity, kind: ErrorKind, message: impl Into<String>, node: Option<&str>) {
        self.errors.push(ValidationError {
            severity,
            kind,
            message: message.into(),
            node: node.map(str::to_string),
        });
    }

    pub(crate) fn warn(&mut self, kind: WarningKind, message: impl Into<String>, node: Option<&str>) {
        self.warnings.push(ValidationWarning {
            kind,
            message: message.into(),
            node: node.map(str::to_string),
            suggestion: None,
        });
    }

    pub fn has_critical(&self) -> bool {
        self.errors.iter().any(|e| e.severity == Severity::Critical)
    }

    /// Recompute the verdict: valid iff no critical error.
    pub(crate) fn finalize(&mut self) {
        self.valid = !self.has_critical();
    }

    pub fn errors_of(&self, severity: Severity) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.severity == severity)
    }

    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &ValidationWarning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}
