//! Workflow model — typed nodes plus directed connections.
//!
//! The serialized form follows the automation platform's wire format:
//!
//! ```json
//! {
//!   "name": "Slack alert",
//!   "nodes": [{ "name": "Webhook", "type": "n8n-nodes-base.webhook",
//!               "typeVersion": 1, "position": [250, 300], "parameters": {} }],
//!   "connections": {
//!     "Webhook": { "main": [[{ "node": "Slack", "type": "main", "index": 0 }]] }
//!   }
//! }
//! ```
//!
//! Connections are keyed by source node name, then by connection kind
//! (`main`, `ai_tool`, ...). Each kind holds an ordered list of output
//! slots, and each slot an ordered list of edges.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Fields the platform assigns and manages itself. Sending them on
/// create/update is either rejected or silently stripped.
pub const SERVER_MANAGED_FIELDS: &[&str] = &[
    "id",
    "createdAt",
    "updatedAt",
    "versionId",
    "isArchived",
    "triggerCount",
    "shared",
];

/// The default connection kind between two regular nodes.
pub const MAIN_CONNECTION: &str = "main";

/// Outgoing connections of a single source node, by connection kind.
pub type NodeConnections = BTreeMap<String, Vec<Vec<ConnectionTarget>>>;

/// A named graph of nodes and directed connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,

    #[serde(default)]
    pub nodes: Vec<Node>,

    #[serde(default)]
    pub connections: BTreeMap<String, NodeConnections>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,

    /// Any other top-level fields (server-managed metadata included).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single typed unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Unique within a workflow; connections refer to nodes by this name.
    pub name: String,

    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(rename = "typeVersion", default = "default_type_version")]
    pub type_version: f64,

    pub position: [f64; 2],

    #[serde(default)]
    pub parameters: Map<String, Value>,
}

fn default_type_version() -> f64 {
    1.0
}

/// One edge inside an output slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    /// Target node name.
    pub node: String,

    /// Edge kind (mirrors the connection kind, usually `main`).
    #[serde(rename = "type")]
    pub kind: String,

    /// Input index on the target node.
    pub index: u32,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            connections: BTreeMap::new(),
            settings: None,
            extra: Map::new(),
        }
    }

    /// Append a node (builder style).
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Connect `from` output slot 0 to `to` input 0 over the `main` kind.
    pub fn with_connection(mut self, from: &str, to: &str) -> Self {
        self.connect(from, 0, to, 0);
        self
    }

    /// Add a `main` edge from a specific output slot to a specific input.
    pub fn connect(&mut self, from: &str, output: usize, to: &str, input: u32) {
        let slots = self
            .connections
            .entry(from.to_string())
            .or_default()
            .entry(MAIN_CONNECTION.to_string())
            .or_default();
        if slots.len() <= output {
            slots.resize_with(output + 1, Vec::new);
        }
        slots[output].push(ConnectionTarget {
            node: to.to_string(),
            kind: MAIN_CONNECTION.to_string(),
            index: input,
        });
    }

    /// Find a node by exact (case-sensitive) name.
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Total number of edges across all sources, kinds, and slots.
    pub fn edge_count(&self) -> usize {
        self.connections
            .values()
            .flat_map(|kinds| kinds.values())
            .flat_map(|slots| slots.iter())
            .map(Vec::len)
            .sum()
    }

    /// Names of any server-managed fields present on this workflow.
    pub fn server_managed_fields(&self) -> Vec<&'static str> {
        SERVER_MANAGED_FIELDS
            .iter()
            .copied()
            .filter(|f| self.extra.contains_key(*f))
            .collect()
    }

    /// Remove server-managed fields before sending to the platform.
    pub fn strip_server_fields(&mut self) -> usize {
        let before = self.extra.len();
        for field in SERVER_MANAGED_FIELDS {
            self.extra.remove(*field);
        }
        before - self.extra.len()
    }

    /// The wire representation of this workflow.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Node {
    pub fn new(name: impl Into<String>, node_type: impl Into<String>, position: [f64; 2]) -> Self {
        Self {
            id: None,
            name: name.into(),
            node_type: node_type.into(),
            type_version: default_type_version(),
            position,
            parameters: Map::new(),
        }
    }

    /// Set a single parameter (builder style).
    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    pub fn with_type_version(mut self, version: f64) -> Self {
        self.type_version = version;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_node_workflow() -> Workflow {
        Workflow::new("demo")
            .with_node(Node::new("Webhook", "n8n-nodes-base.webhook", [250.0, 300.0]))
            .with_node(Node::new("Slack", "n8n-nodes-base.slack", [450.0, 300.0]))
            .with_connection("Webhook", "Slack")
    }

    #[test]
    fn serializes_to_platform_wire_format() {
        let value = two_node_workflow().to_value();
        assert_eq!(value["nodes"][0]["type"], "n8n-nodes-base.webhook");
        assert_eq!(value["nodes"][0]["position"], json!([250.0, 300.0]));
        assert_eq!(
            value["connections"]["Webhook"]["main"][0][0],
            json!({"node": "Slack", "type": "main", "index": 0})
        );
    }

    #[test]
    fn connect_pads_output_slots() {
        let mut wf = two_node_workflow();
        wf.connect("Webhook", 2, "Slack", 1);
        let slots = &wf.connections["Webhook"]["main"];
        assert_eq!(slots.len(), 3);
        assert!(slots[1].is_empty());
        assert_eq!(slots[2][0].index, 1);
        assert_eq!(wf.edge_count(), 2);
    }

    #[test]
    fn strips_server_managed_fields() {
        let raw = json!({
            "name": "from server",
            "id": "42",
            "createdAt": "2024-01-01T00:00:00Z",
            "versionId": "abc",
            "tags": [],
            "nodes": [],
            "connections": {}
        });
        let mut wf: Workflow = serde_json::from_value(raw).unwrap();
        assert_eq!(wf.server_managed_fields(), vec!["id", "createdAt", "versionId"]);

        let removed = wf.strip_server_fields();
        assert_eq!(removed, 3);
        assert!(wf.server_managed_fields().is_empty());
        assert!(wf.extra.contains_key("tags"));
    }

    #[test]
    fn node_lookup_is_case_sensitive() {
        let wf = two_node_workflow();
        assert!(wf.node("Slack").is_some());
        assert!(wf.node("slack").is_none());
    }
}
