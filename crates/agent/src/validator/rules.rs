//! Deterministic validation layers (structural through compliance).
//!
//! Operates on raw JSON rather than the typed [`Workflow`] so malformed
//! shapes (missing names, string positions, bad connection entries) are
//! reported instead of failing deserialization.
//!
//! [`Workflow`]: flowsmith_core::workflow::Workflow

use super::result::{ErrorKind, Severity, ValidationResult, WarningKind};
use crate::registry::{NodeClass, NodeRegistry};
use flowsmith_core::pattern::Complexity;
use flowsmith_core::workflow::SERVER_MANAGED_FIELDS;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Node count above which a workflow draws a size warning.
pub const MAX_RECOMMENDED_NODES: usize = 100;

/// Compact view of a structurally sane workflow, used by the semantic pass.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub nodes: Vec<NodeSummary>,
    pub edges: Vec<(String, String)>,
    pub trigger_count: usize,
    pub action_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub class: NodeClass,
}

pub struct StructuralReport {
    pub result: ValidationResult,
    /// `None` when an early layer short-circuited.
    pub summary: Option<WorkflowSummary>,
}

/// Run layers 1–6 and compute the verdict.
pub fn validate_structure(value: &Value, registry: &NodeRegistry) -> StructuralReport {
    let mut result = ValidationResult::default();

    let Some((workflow, nodes, connections)) = check_shape(value, &mut result) else {
        return short_circuit(result);
    };

    let views = check_nodes(nodes, registry, &mut result);
    if result.has_critical() {
        return short_circuit(result);
    }

    let names: HashSet<&str> = views.iter().map(|v| v.name.as_str()).collect();
    let (referenced, edges) = check_connections(connections, &names, &mut result);
    check_orphans(&views, &referenced, &mut result);
    check_topology(&views, &mut result);
    check_compliance(workflow, &mut result);

    result.finalize();
    let summary = WorkflowSummary {
        name: workflow
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        trigger_count: result.statistics.trigger_count,
        action_count: result.statistics.action_count,
        nodes: views,
        edges,
    };
    StructuralReport {
        result,
        summary: Some(summary),
    }
}

fn short_circuit(mut result: ValidationResult) -> StructuralReport {
    result.finalize();
    StructuralReport {
        result,
        summary: None,
    }
}

// ── Layer 1: structural ──────────────────────────────────────────────

type Shape<'a> = (&'a Map<String, Value>, &'a [Value], &'a Map<String, Value>);

fn check_shape<'a>(value: &'a Value, result: &mut ValidationResult) -> Option<Shape<'a>> {
    let Some(workflow) = value.as_object() else {
        result.error(
            Severity::Critical,
            ErrorKind::Structural,
            "Workflow must be a JSON object",
            None,
        );
        return None;
    };

    if workflow
        .get("name")
        .and_then(Value::as_str)
        .is_none_or(|n| n.trim().is_empty())
    {
        result.warn(WarningKind::Structural, "Workflow has no name", None);
    }

    let nodes: &[Value] = match workflow.get("nodes") {
        Some(Value::Array(nodes)) => nodes,
        Some(_) => {
            result.error(
                Severity::Critical,
                ErrorKind::Structural,
                "Workflow nodes must be an array",
                None,
            );
            &[]
        }
        None => {
            result.error(
                Severity::Critical,
                ErrorKind::Structural,
                "Workflow must have a nodes array",
                None,
            );
            &[]
        }
    };

    result.node_count = nodes.len();
    result.statistics.complexity = Complexity::from_node_count(nodes.len());

    if nodes.is_empty() && !result.has_critical() {
        result.error(
            Severity::Critical,
            ErrorKind::Structural,
            "Workflow must have at least one node",
            None,
        );
    }
    if nodes.len() > MAX_RECOMMENDED_NODES {
        result.warn(
            WarningKind::Structural,
            format!(
                "Workflow has {} nodes; consider splitting it (more than {MAX_RECOMMENDED_NODES})",
                nodes.len()
            ),
            None,
        );
    }

    let connections = match workflow.get("connections") {
        Some(Value::Object(connections)) => Some(connections),
        Some(_) => {
            result.error(
                Severity::Critical,
                ErrorKind::Structural,
                "Workflow connections must be an object keyed by source node name",
                None,
            );
            None
        }
        None => {
            result.error(
                Severity::Critical,
                ErrorKind::Structural,
                "Workflow must have a connections object",
                None,
            );
            None
        }
    };

    if result.has_critical() {
        return None;
    }
    connections.map(|c| (workflow, nodes, c))
}

// ── Layer 2: per-node ────────────────────────────────────────────────

fn check_nodes(nodes: &[Value], registry: &NodeRegistry, result: &mut ValidationResult) -> Vec<NodeSummary> {
    let mut views = Vec::with_capacity(nodes.len());
    let mut seen: HashSet<&str> = HashSet::new();

    for (i, node) in nodes.iter().enumerate() {
        let Some(node) = node.as_object() else {
            result.error(
                Severity::Critical,
                ErrorKind::Node,
                format!("Node #{i} must be an object"),
                None,
            );
            continue;
        };

        let name = non_empty_str(node.get("name"));
        let label = name.map_or_else(|| format!("#{i}"), |n| format!("'{n}'"));
        if name.is_none() {
            result.error(
                Severity::Critical,
                ErrorKind::Node,
                format!("Node {label} is missing a name"),
                None,
            );
        }

        let node_type = non_empty_str(node.get("type"));
        match node_type {
            None => result.error(
                Severity::Critical,
                ErrorKind::Node,
                format!("Node {label} is missing a type"),
                name,
            ),
            Some(t) if !registry.is_known(t) => {
                result.warn(
                    WarningKind::UnknownNodeType,
                    format!("Node {label} has unrecognized type '{t}'"),
                    name,
                );
                if let Some(w) = result.warnings.last_mut() {
                    w.suggestion = Some("Check the type against the platform's node catalog".into());
                }
            }
            Some(_) => {}
        }

        let position_ok = node
            .get("position")
            .and_then(Value::as_array)
            .is_some_and(|p| p.len() == 2 && p.iter().all(Value::is_number));
        if !position_ok {
            result.error(
                Severity::High,
                ErrorKind::Node,
                format!("Node {label} position must be a two-element numeric array"),
                name,
            );
        }

        if node
            .get("parameters")
            .is_some_and(|p| !p.is_null() && !p.is_object())
        {
            result.error(
                Severity::Medium,
                ErrorKind::Node,
                format!("Node {label} parameters must be an object"),
                name,
            );
        }

        if let Some(n) = name {
            if !seen.insert(n) {
                result.error(
                    Severity::High,
                    ErrorKind::Node,
                    format!("Duplicate node name '{n}'"),
                    name,
                );
                continue;
            }
        }

        if let (Some(name), Some(node_type)) = (name, node_type) {
            views.push(NodeSummary {
                name: name.to_string(),
                node_type: node_type.to_string(),
                class: registry.classify(node_type),
            });
        }
    }
    views
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

// ── Layer 3: connectivity ────────────────────────────────────────────

fn check_connections(
    connections: &Map<String, Value>,
    names: &HashSet<&str>,
    result: &mut ValidationResult,
) -> (HashSet<String>, Vec<(String, String)>) {
    let mut referenced: HashSet<String> = HashSet::new();
    let mut edges = Vec::new();

    for (source, entry) in connections {
        let source = source.as_str();
        referenced.insert(source.to_string());
        if !names.contains(source) {
            result.error(
                Severity::High,
                ErrorKind::Reference,
                format!("Connection source '{source}' does not match any node"),
                Some(source),
            );
        }

        let Some(kinds) = entry.as_object() else {
            result.error(
                Severity::High,
                ErrorKind::Structural,
                format!("Connections of '{source}' must map connection types to lists of output slots"),
                Some(source),
            );
            continue;
        };

        for (kind, slots) in kinds {
            let Some(slots) = slots.as_array() else {
                result.error(
                    Severity::High,
                    ErrorKind::Structural,
                    format!("Connections of '{source}' ({kind}) must be a list of output slots"),
                    Some(source),
                );
                continue;
            };

            for (slot_index, slot) in slots.iter().enumerate() {
                let slot_edges: &[Value] = match slot {
                    Value::Array(slot_edges) => slot_edges,
                    Value::Null => &[],
                    _ => {
                        result.error(
                            Severity::High,
                            ErrorKind::Structural,
                            format!("Output slot {slot_index} of '{source}' ({kind}) must be a list of edges"),
                            Some(source),
                        );
                        continue;
                    }
                };

                for edge in slot_edges {
                    result.connection_count += 1;
                    check_edge(source, edge, names, result, &mut referenced, &mut edges);
                }
            }
        }
    }
    (referenced, edges)
}

fn check_edge(
    source: &str,
    edge: &Value,
    names: &HashSet<&str>,
    result: &mut ValidationResult,
    referenced: &mut HashSet<String>,
    edges: &mut Vec<(String, String)>,
) {
    let Some(edge) = edge.as_object() else {
        result.error(
            Severity::High,
            ErrorKind::Structural,
            format!("Edge from '{source}' must be an object"),
            Some(source),
        );
        return;
    };

    let Some(target) = edge.get("node").and_then(Value::as_str) else {
        result.error(
            Severity::High,
            ErrorKind::Reference,
            format!("Edge from '{source}' has no target node"),
            Some(source),
        );
        return;
    };
    referenced.insert(target.to_string());

    if names.contains(target) {
        edges.push((source.to_string(), target.to_string()));
    } else {
        result.error(
            Severity::High,
            ErrorKind::Reference,
            format!("Connection from '{source}' targets unknown node '{target}'"),
            Some(source),
        );
    }

    if !edge.get("index").is_some_and(Value::is_number) {
        result.error(
            Severity::High,
            ErrorKind::Structural,
            format!("Edge from '{source}' to '{target}' must have a numeric input index"),
            Some(source),
        );
    }
}

// ── Layer 4: reachability ────────────────────────────────────────────

fn check_orphans(views: &[NodeSummary], referenced: &HashSet<String>, result: &mut ValidationResult) {
    for view in views {
        if referenced.contains(&view.name) {
            result.statistics.connected_nodes += 1;
        } else {
            result.statistics.orphaned_nodes += 1;
            result.warn(
                WarningKind::Orphan,
                format!("Node '{}' is not connected to any other node", view.name),
                Some(view.name.as_str()),
            );
        }
    }
}

// ── Layer 5: topology sanity ─────────────────────────────────────────

fn check_topology(views: &[NodeSummary], result: &mut ValidationResult) {
    let triggers = views.iter().filter(|v| v.class == NodeClass::Trigger).count();
    let actions = views.iter().filter(|v| v.class == NodeClass::Action).count();
    result.statistics.trigger_count = triggers;
    result.statistics.action_count = actions;

    match triggers {
        0 => result.error(
            Severity::Critical,
            ErrorKind::Topology,
            "Workflow has no trigger node (missing entry point)",
            None,
        ),
        1 => {}
        n => result.warn(
            WarningKind::Topology,
            format!("Workflow has {n} trigger nodes; usually there is exactly one"),
            None,
        ),
    }

    if actions == 0 {
        result.error(
            Severity::High,
            ErrorKind::Topology,
            "Workflow has no action nodes (nothing for the workflow to do)",
            None,
        );
    }
}

// ── Layer 6: compliance ──────────────────────────────────────────────

fn check_compliance(workflow: &Map<String, Value>, result: &mut ValidationResult) {
    let present: Vec<&str> = SERVER_MANAGED_FIELDS
        .iter()
        .copied()
        .filter(|f| workflow.contains_key(*f))
        .collect();
    if present.is_empty() {
        return;
    }
    result.warn(
        WarningKind::Compliance,
        format!("Workflow contains server-managed fields: {}", present.join(", ")),
        None,
    );
    if let Some(w) = result.warnings.last_mut() {
        w.suggestion = Some(
            "Remove these fields before creating or updating the workflow; the platform assigns them"
                .into(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(value: Value) -> ValidationResult {
        validate_structure(&value, &NodeRegistry::builtin()).result
    }

    fn node(name: &str, ty: &str) -> Value {
        json!({"name": name, "type": ty, "typeVersion": 1, "position": [0, 0], "parameters": {}})
    }

    fn edge(target: &str) -> Value {
        json!([[{"node": target, "type": "main", "index": 0}]])
    }

    #[test]
    fn empty_workflow_is_critical() {
        let result = validate(json!({"name": "t", "nodes": [], "connections": {}}));
        assert!(!result.valid);
        assert_eq!(result.node_count, 0);
        let critical: Vec<_> = result.errors_of(Severity::Critical).collect();
        assert_eq!(critical.len(), 1);
        assert!(critical[0].message.contains("must have at least one node"));
    }

    #[test]
    fn non_object_short_circuits() {
        let report = validate_structure(&json!(null), &NodeRegistry::builtin());
        assert!(!report.result.valid);
        assert!(report.summary.is_none());
        assert_eq!(report.result.errors.len(), 1);
    }

    #[test]
    fn dangling_target_and_orphan() {
        let result = validate(json!({
            "name": "t",
            "nodes": [node("A", "n8n-nodes-base.webhook"), node("B", "n8n-nodes-base.slack")],
            "connections": {"A": {"main": edge("C")}}
        }));

        let refs: Vec<_> = result
            .errors
            .iter()
            .filter(|e| e.kind == ErrorKind::Reference)
            .collect();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].severity, Severity::High);
        assert!(refs[0].message.contains("'C'"));

        let orphans: Vec<_> = result.warnings_of(WarningKind::Orphan).collect();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].node.as_deref(), Some("B"));
        assert_eq!(result.statistics.orphaned_nodes, 1);
        assert_eq!(result.statistics.connected_nodes, 1);
        // High severity does not flip the verdict.
        assert!(result.valid);
    }

    #[test]
    fn missing_trigger_is_critical_on_its_own() {
        let result = validate(json!({
            "name": "t",
            "nodes": [node("Slack", "n8n-nodes-base.slack")],
            "connections": {}
        }));
        assert!(!result.valid);
        let critical: Vec<_> = result.errors_of(Severity::Critical).collect();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].kind, ErrorKind::Topology);
        assert!(critical[0].message.contains("no trigger"));
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn no_actions_is_high_severity() {
        let result = validate(json!({
            "name": "t",
            "nodes": [node("Start", "n8n-nodes-base.manualTrigger"), node("If", "n8n-nodes-base.if")],
            "connections": {"Start": {"main": edge("If")}}
        }));
        assert!(result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].severity, Severity::High);
        assert!(result.errors[0].message.contains("no action nodes"));
    }

    #[test]
    fn multiple_triggers_warn() {
        let result = validate(json!({
            "name": "t",
            "nodes": [
                node("Hook", "n8n-nodes-base.webhook"),
                node("Cron", "n8n-nodes-base.scheduleTrigger"),
                node("Slack", "n8n-nodes-base.slack")
            ],
            "connections": {"Hook": {"main": edge("Slack")}, "Cron": {"main": edge("Slack")}}
        }));
        assert!(result.valid);
        assert_eq!(result.statistics.trigger_count, 2);
        assert_eq!(result.warnings_of(WarningKind::Topology).count(), 1);
    }

    #[test]
    fn per_node_field_checks() {
        let result = validate(json!({
            "name": "t",
            "nodes": [
                {"name": "Hook", "type": "n8n-nodes-base.webhook", "position": [0, 0]},
                {"name": "Bad", "type": "acme.unknown", "position": ["x", 0], "parameters": "nope"},
                {"type": "n8n-nodes-base.slack", "position": [0, 0]}
            ],
            "connections": {}
        }));
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.severity == Severity::Critical && e.message.contains("#2 is missing a name")));
        assert!(result.errors.iter().any(|e| e.severity == Severity::High && e.message.contains("position")));
        assert!(result.errors.iter().any(|e| e.severity == Severity::Medium && e.message.contains("parameters")));
        assert_eq!(result.warnings_of(WarningKind::UnknownNodeType).count(), 1);
        // Short-circuited before topology.
        assert_eq!(result.statistics.trigger_count, 0);
        assert_eq!(result.warnings_of(WarningKind::Orphan).count(), 0);
    }

    #[test]
    fn malformed_connection_shapes() {
        let result = validate(json!({
            "name": "t",
            "nodes": [node("A", "n8n-nodes-base.webhook"), node("B", "n8n-nodes-base.slack")],
            "connections": {
                "A": {"main": [[{"node": "B", "type": "main", "index": "0"}]]},
                "Ghost": {"main": edge("B")},
                "B": [[{"node": "A"}]]
            }
        }));
        assert!(result.errors.iter().any(|e| e.message.contains("numeric input index")));
        assert!(result.errors.iter().any(|e| e.message.contains("'Ghost' does not match")));
        assert!(result.errors.iter().any(|e| e.message.contains("Connections of 'B'")));
        assert_eq!(result.connection_count, 2);
        assert!(result.valid);
    }

    #[test]
    fn server_fields_raise_compliance_warning() {
        let result = validate(json!({
            "name": "t",
            "id": "17",
            "updatedAt": "2024-01-01",
            "nodes": [node("A", "n8n-nodes-base.webhook"), node("B", "n8n-nodes-base.slack")],
            "connections": {"A": {"main": edge("B")}}
        }));
        assert!(result.valid);
        let compliance: Vec<_> = result.warnings_of(WarningKind::Compliance).collect();
        assert_eq!(compliance.len(), 1);
        assert!(compliance[0].message.contains("id, updatedAt"));
        assert!(compliance[0].suggestion.is_some());
    }

    #[test]
    fn large_workflow_warns_and_is_complex() {
        let mut nodes = vec![node("Start", "n8n-nodes-base.manualTrigger")];
        let mut connections = serde_json::Map::new();
        for i in 0..MAX_RECOMMENDED_NODES {
            let name = format!("Step {i}");
            let prev = if i == 0 { "Start".to_string() } else { format!("Step {}", i - 1) };
            connections.insert(prev, json!({"main": edge(&name)}));
            nodes.push(node(&name, "n8n-nodes-base.set"));
        }
        let result = validate(json!({"name": "big", "nodes": nodes, "connections": connections}));
        assert!(result.valid);
        assert_eq!(result.node_count, 101);
        assert_eq!(result.statistics.complexity, Complexity::Complex);
        assert_eq!(result.warnings_of(WarningKind::Structural).count(), 1);
        assert_eq!(result.statistics.orphaned_nodes, 0);
    }

    #[test]
    fn summary_lists_resolved_edges() {
        let report = validate_structure(
            &json!({
                "name": "t",
                "nodes": [node("A", "n8n-nodes-base.webhook"), node("B", "n8n-nodes-base.slack")],
                "connections": {"A": {"main": edge("B")}}
            }),
            &NodeRegistry::builtin(),
        );
        let summary = report.summary.unwrap();
        assert_eq!(summary.edges, vec![("A".to_string(), "B".to_string())]);
        assert_eq!(summary.trigger_count, 1);
        assert_eq!(summary.nodes[1].class, NodeClass::Action);
    }
}
