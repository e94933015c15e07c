//! Template registry: pattern id → workflow builder.
//!
//! New patterns get a workflow shape by registering a builder; ids with
//! no builder fall back to [`generic_workflow`], which chains the
//! pattern's suggested node types behind a trigger.

use crate::registry::{NodeClass, NodeRegistry};
use flowsmith_core::graph::GraphInsights;
use flowsmith_core::pattern::PatternMatch;
use flowsmith_core::workflow::{Node, Workflow};
use serde_json::{Value, json};
use std::collections::HashMap;

const X_START: f64 = 250.0;
const X_STEP: f64 = 220.0;
const Y_MAIN: f64 = 300.0;

/// Insight node types appended by the generic builder, at most.
pub const MAX_INSIGHT_NODES: usize = 2;

/// Everything a builder may use.
pub struct TemplateContext<'a> {
    pub goal: &'a str,
    pub pattern: &'a PatternMatch,
    pub insights: Option<&'a GraphInsights>,
    pub nodes: &'a NodeRegistry,
}

pub type TemplateBuilder = fn(&TemplateContext<'_>) -> Workflow;

pub struct TemplateRegistry {
    builders: HashMap<String, TemplateBuilder>,
}

impl TemplateRegistry {
    /// An empty registry; every pattern uses the generic builder.
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Builders for every built-in pattern.
    pub fn builtin() -> Self {
        Self::empty()
            .with("slack-notification", slack_notification)
            .with("webhook-to-http", webhook_to_http)
            .with("scheduled-report", scheduled_report)
            .with("email-digest", email_digest)
            .with("database-sync", database_sync)
            .with("form-to-crm", form_to_crm)
            .with("ai-chat-assistant", ai_chat_assistant)
            .with("file-backup", file_backup)
            .with("rss-monitor", rss_monitor)
            .with("error-alerting", error_alerting)
    }

    pub fn with(mut self, pattern_id: &str, builder: TemplateBuilder) -> Self {
        self.register(pattern_id, builder);
        self
    }

    pub fn register(&mut self, pattern_id: &str, builder: TemplateBuilder) {
        self.builders.insert(pattern_id.to_string(), builder);
    }

    pub fn contains(&self, pattern_id: &str) -> bool {
        self.builders.contains_key(pattern_id)
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    pub fn build(&self, ctx: &TemplateContext<'_>) -> Workflow {
        match self.builders.get(&ctx.pattern.pattern_id) {
            Some(builder) => builder(ctx),
            None => generic_workflow(ctx),
        }
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn params(value: Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => Vec::new(),
    }
}

fn node(name: &str, node_type: &str, index: usize, parameters: Value) -> Node {
    params(parameters).into_iter().fold(
        Node::new(name, node_type, [X_START + X_STEP * index as f64, Y_MAIN]),
        |n, (k, v)| n.with_param(&k, v),
    )
}

/// A linear chain of nodes, each feeding the next.
fn chain(name: &str, nodes: Vec<Node>) -> Workflow {
    let mut workflow = Workflow::new(name);
    let names: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();
    workflow.nodes = nodes;
    for pair in names.windows(2) {
        workflow.connect(&pair[0], 0, &pair[1], 0);
    }
    workflow
}

fn workflow_name(ctx: &TemplateContext<'_>) -> String {
    let goal = ctx.goal.trim();
    if goal.is_empty() {
        return ctx.pattern.pattern_name.clone();
    }
    let short: String = goal.chars().take(60).collect();
    format!("{} - {}", ctx.pattern.pattern_name, short)
}

fn unique_name(taken: &[String], base: &str) -> String {
    if !taken.iter().any(|t| t == base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{base} {i}"))
        .find(|candidate| !taken.iter().any(|t| t == candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Fallback builder: trigger + suggested nodes (+ insight nodes), chained.
pub fn generic_workflow(ctx: &TemplateContext<'_>) -> Workflow {
    let mut types: Vec<String> = ctx.pattern.suggested_nodes.clone();

    match types
        .iter()
        .position(|t| ctx.nodes.classify(t) == NodeClass::Trigger)
    {
        Some(pos) => {
            let trigger = types.remove(pos);
            types.insert(0, trigger);
        }
        None => types.insert(0, "n8n-nodes-base.manualTrigger".to_string()),
    }

    if let Some(insights) = ctx.insights {
        let extra: Vec<String> = insights
            .nodes
            .iter()
            .map(|n| n.id.clone())
            .filter(|id| ctx.nodes.classify(id) == NodeClass::Action && !types.contains(id))
            .take(MAX_INSIGHT_NODES)
            .collect();
        types.extend(extra);
    }

    let mut names: Vec<String> = Vec::with_capacity(types.len());
    let mut nodes = Vec::with_capacity(types.len());
    for (i, node_type) in types.iter().enumerate() {
        let name = unique_name(&names, &ctx.nodes.display_name(node_type));
        names.push(name.clone());
        nodes.push(node(&name, node_type, i, json!({})));
    }
    chain(&workflow_name(ctx), nodes)
}

fn slack_notification(ctx: &TemplateContext<'_>) -> Workflow {
    chain(
        &workflow_name(ctx),
        vec![
            node(
                "Postgres Trigger",
                "n8n-nodes-base.postgresTrigger",
                0,
                json!({"triggerMode": "listenTrigger", "tableName": "events", "firesOn": "INSERT"}),
            ),
            node(
                "Format Message",
                "n8n-nodes-base.set",
                1,
                json!({"assignments": {"assignments": [
                    {"name": "text", "type": "string", "value": "=Row changed: {{ JSON.stringify($json) }}"}
                ]}}),
            ),
            node(
                "Slack",
                "n8n-nodes-base.slack",
                2,
                json!({"resource": "message", "operation": "post", "channel": "#alerts", "text": "={{ $json.text }}"}),
            ),
        ],
    )
}

fn webhook_to_http(ctx: &TemplateContext<'_>) -> Workflow {
    chain(
        &workflow_name(ctx),
        vec![
            node(
                "Webhook",
                "n8n-nodes-base.webhook",
                0,
                json!({"httpMethod": "POST", "path": "incoming", "responseMode": "responseNode"}),
            ),
            node("Transform", "n8n-nodes-base.set", 1, json!({"includeOtherFields": true})),
            node(
                "HTTP Request",
                "n8n-nodes-base.httpRequest",
                2,
                json!({"method": "POST", "url": "https://example.com/api", "sendBody": true}),
            ),
            node(
                "Respond to Webhook",
                "n8n-nodes-base.respondToWebhook",
                3,
                json!({"respondWith": "allIncomingItems"}),
            ),
        ],
    )
}

fn scheduled_report(ctx: &TemplateContext<'_>) -> Workflow {
    chain(
        &workflow_name(ctx),
        vec![
            node(
                "Schedule Trigger",
                "n8n-nodes-base.scheduleTrigger",
                0,
                json!({"rule": {"interval": [{"field": "days", "triggerAtHour": 8}]}}),
            ),
            node(
                "Fetch Data",
                "n8n-nodes-base.httpRequest",
                1,
                json!({"method": "GET", "url": "https://example.com/metrics"}),
            ),
            node(
                "Build Report",
                "n8n-nodes-base.code",
                2,
                json!({"jsCode": "return [{ json: { report: JSON.stringify($input.all().map(i => i.json)) } }];"}),
            ),
            node(
                "Send Email",
                "n8n-nodes-base.emailSend",
                3,
                json!({"subject": "Daily report", "text": "={{ $json.report }}"}),
            ),
        ],
    )
}

fn email_digest(ctx: &TemplateContext<'_>) -> Workflow {
    chain(
        &workflow_name(ctx),
        vec![
            node(
                "Email Trigger (IMAP)",
                "n8n-nodes-base.emailReadImap",
                0,
                json!({"mailbox": "INBOX"}),
            ),
            node(
                "Summarize",
                "n8n-nodes-base.code",
                1,
                json!({"jsCode": "return [{ json: { digest: $input.all().map(i => i.json.subject).join('\\n') } }];"}),
            ),
            node(
                "Send Digest",
                "n8n-nodes-base.emailSend",
                2,
                json!({"subject": "Inbox digest", "text": "={{ $json.digest }}"}),
            ),
        ],
    )
}

fn database_sync(ctx: &TemplateContext<'_>) -> Workflow {
    let mut workflow = chain(
        &workflow_name(ctx),
        vec![
            node(
                "Schedule Trigger",
                "n8n-nodes-base.scheduleTrigger",
                0,
                json!({"rule": {"interval": [{"field": "minutes", "minutesInterval": 15}]}}),
            ),
            node(
                "Read Source",
                "n8n-nodes-base.postgres",
                1,
                json!({"operation": "executeQuery", "query": "SELECT * FROM records WHERE updated_at > now() - interval '15 minutes'"}),
            ),
            node(
                "Has Rows",
                "n8n-nodes-base.if",
                2,
                json!({"conditions": {"number": [{"value1": "={{ $json.id }}", "operation": "isNotEmpty"}]}}),
            ),
            node(
                "Write Target",
                "n8n-nodes-base.mySql",
                3,
                json!({"operation": "upsert", "table": "records"}),
            ),
        ],
    );
    // False branch of the IF ends the run.
    workflow.connect("Has Rows", 1, "No Changes", 0);
    workflow.nodes.push(node("No Changes", "n8n-nodes-base.noOp", 3, json!({})));
    if let Some(last) = workflow.nodes.last_mut() {
        last.position[1] = Y_MAIN + 200.0;
    }
    workflow
}

fn form_to_crm(ctx: &TemplateContext<'_>) -> Workflow {
    chain(
        &workflow_name(ctx),
        vec![
            node(
                "Form Trigger",
                "n8n-nodes-base.formTrigger",
                0,
                json!({"formTitle": "Contact us", "formFields": {"values": [
                    {"fieldLabel": "Name"}, {"fieldLabel": "Email", "fieldType": "email"}
                ]}}),
            ),
            node("Map Fields", "n8n-nodes-base.set", 1, json!({"includeOtherFields": false})),
            node(
                "HubSpot",
                "n8n-nodes-base.hubspot",
                2,
                json!({"resource": "contact", "operation": "upsert", "email": "={{ $json.Email }}"}),
            ),
        ],
    )
}

fn ai_chat_assistant(ctx: &TemplateContext<'_>) -> Workflow {
    let mut workflow = chain(
        &workflow_name(ctx),
        vec![
            node("Chat Trigger", "@n8n/n8n-nodes-langchain.chatTrigger", 0, json!({})),
            node(
                "AI Agent",
                "@n8n/n8n-nodes-langchain.agent",
                1,
                json!({"options": {"systemMessage": "You are a helpful assistant."}}),
            ),
        ],
    );

    let mut model = node(
        "OpenAI Chat Model",
        "@n8n/n8n-nodes-langchain.lmChatOpenAi",
        1,
        json!({"model": "gpt-4o-mini"}),
    );
    model.position[1] = Y_MAIN + 200.0;
    let mut memory = node(
        "Window Buffer Memory",
        "@n8n/n8n-nodes-langchain.memoryBufferWindow",
        2,
        json!({"contextWindowLength": 10}),
    );
    memory.position[1] = Y_MAIN + 200.0;
    workflow.nodes.push(model);
    workflow.nodes.push(memory);

    // Sub-nodes attach to the agent over their own connection kinds.
    for (source, kind) in [
        ("OpenAI Chat Model", "ai_languageModel"),
        ("Window Buffer Memory", "ai_memory"),
    ] {
        workflow
            .connections
            .entry(source.to_string())
            .or_default()
            .insert(
                kind.to_string(),
                vec![vec![flowsmith_core::workflow::ConnectionTarget {
                    node: "AI Agent".to_string(),
                    kind: kind.to_string(),
                    index: 0,
                }]],
            );
    }
    workflow
}

fn file_backup(ctx: &TemplateContext<'_>) -> Workflow {
    chain(
        &workflow_name(ctx),
        vec![
            node(
                "Schedule Trigger",
                "n8n-nodes-base.scheduleTrigger",
                0,
                json!({"rule": {"interval": [{"field": "days", "triggerAtHour": 2}]}}),
            ),
            node(
                "Read Files",
                "n8n-nodes-base.readWriteFile",
                1,
                json!({"operation": "read", "fileSelector": "/data/**/*"}),
            ),
            node(
                "Upload to S3",
                "n8n-nodes-base.awsS3",
                2,
                json!({"operation": "upload", "bucketName": "backups", "fileName": "={{ $binary.data.fileName }}"}),
            ),
        ],
    )
}

fn rss_monitor(ctx: &TemplateContext<'_>) -> Workflow {
    chain(
        &workflow_name(ctx),
        vec![
            node(
                "RSS Feed Trigger",
                "n8n-nodes-base.rssFeedReadTrigger",
                0,
                json!({"feedUrl": "https://example.com/feed.xml", "pollTimes": {"item": [{"mode": "everyHour"}]}}),
            ),
            node(
                "Filter",
                "n8n-nodes-base.filter",
                1,
                json!({"conditions": {"string": [{"value1": "={{ $json.title }}", "operation": "isNotEmpty"}]}}),
            ),
            node(
                "Telegram",
                "n8n-nodes-base.telegram",
                2,
                json!({"chatId": "@channel", "text": "={{ $json.title }}\n{{ $json.link }}"}),
            ),
        ],
    )
}

fn error_alerting(ctx: &TemplateContext<'_>) -> Workflow {
    let mut workflow = chain(
        &workflow_name(ctx),
        vec![
            node("Error Trigger", "n8n-nodes-base.errorTrigger", 0, json!({})),
            node(
                "Describe Failure",
                "n8n-nodes-base.set",
                1,
                json!({"assignments": {"assignments": [
                    {"name": "text", "type": "string", "value": "=Workflow {{ $json.workflow.name }} failed: {{ $json.execution.error.message }}"}
                ]}}),
            ),
            node(
                "Slack",
                "n8n-nodes-base.slack",
                2,
                json!({"resource": "message", "operation": "post", "channel": "#oncall", "text": "={{ $json.text }}"}),
            ),
        ],
    );
    let mut email = node(
        "Send Email",
        "n8n-nodes-base.emailSend",
        2,
        json!({"subject": "Workflow failure", "text": "={{ $json.text }}"}),
    );
    email.position[1] = Y_MAIN + 200.0;
    workflow.nodes.push(email);
    workflow.connect("Describe Failure", 0, "Send Email", 0);
    workflow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::builtin_patterns;
    use flowsmith_core::graph::GraphNode;

    fn pattern_match(id: &str) -> PatternMatch {
        let pattern = builtin_patterns()
            .into_iter()
            .find(|p| p.id == id)
            .unwrap();
        PatternMatch::from_pattern(&pattern, 0.8, vec![])
    }

    fn dangling_references(wf: &Workflow) -> Vec<String> {
        let mut missing = Vec::new();
        for (source, kinds) in &wf.connections {
            if wf.node(source).is_none() {
                missing.push(source.clone());
            }
            for target in kinds.values().flatten().flatten() {
                if wf.node(&target.node).is_none() {
                    missing.push(target.node.clone());
                }
            }
        }
        missing
    }

    #[test]
    fn every_builtin_pattern_has_a_consistent_template() {
        let registry = TemplateRegistry::builtin();
        let nodes = NodeRegistry::builtin();
        for pattern in builtin_patterns() {
            assert!(registry.contains(&pattern.id), "{} has no template", pattern.id);
            let pm = PatternMatch::from_pattern(&pattern, 0.5, vec![]);
            let ctx = TemplateContext {
                goal: "goal",
                pattern: &pm,
                insights: None,
                nodes: &nodes,
            };
            let wf = registry.build(&ctx);
            assert!(!wf.nodes.is_empty());
            assert!(dangling_references(&wf).is_empty(), "{}", pattern.id);
            let triggers = wf
                .nodes
                .iter()
                .filter(|n| nodes.classify(&n.node_type) == NodeClass::Trigger)
                .count();
            assert_eq!(triggers, 1, "{} should have exactly one trigger", pattern.id);
        }
    }

    #[test]
    fn unknown_pattern_uses_generic_builder() {
        let nodes = NodeRegistry::builtin();
        let mut pm = pattern_match("slack-notification");
        pm.pattern_id = "custom".into();
        pm.suggested_nodes = vec!["n8n-nodes-base.slack".into(), "n8n-nodes-base.slack".into()];
        let ctx = TemplateContext {
            goal: "",
            pattern: &pm,
            insights: None,
            nodes: &nodes,
        };
        let wf = TemplateRegistry::builtin().build(&ctx);
        let names: Vec<_> = wf.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Manual Trigger", "Slack", "Slack 1"]);
        assert_eq!(wf.edge_count(), 2);
        assert_eq!(wf.name, "Slack Notification");
    }

    #[test]
    fn generic_builder_moves_trigger_first_and_adds_insights() {
        let nodes = NodeRegistry::builtin();
        let mut pm = pattern_match("slack-notification");
        pm.pattern_id = "custom".into();
        pm.suggested_nodes = vec!["n8n-nodes-base.set".into(), "n8n-nodes-base.webhook".into()];
        let insights = GraphInsights {
            nodes: ["n8n-nodes-base.webhook", "n8n-nodes-base.if", "n8n-nodes-base.slack", "n8n-nodes-base.gmail", "n8n-nodes-base.notion"]
                .iter()
                .map(|id| GraphNode {
                    id: id.to_string(),
                    label: String::new(),
                    score: 0.5,
                })
                .collect(),
            edges: vec![],
        };
        let ctx = TemplateContext {
            goal: "x",
            pattern: &pm,
            insights: Some(&insights),
            nodes: &nodes,
        };
        let wf = generic_workflow(&ctx);
        let types: Vec<_> = wf.nodes.iter().map(|n| n.node_type.as_str()).collect();
        assert_eq!(
            types,
            vec![
                "n8n-nodes-base.webhook",
                "n8n-nodes-base.set",
                "n8n-nodes-base.slack",
                "n8n-nodes-base.gmail",
            ]
        );
    }

    #[test]
    fn registered_builder_overrides_generic() {
        fn tiny(_: &TemplateContext<'_>) -> Workflow {
            Workflow::new("tiny")
        }
        let nodes = NodeRegistry::builtin();
        let pm = pattern_match("file-backup");
        let registry = TemplateRegistry::empty().with("file-backup", tiny);
        assert_eq!(registry.len(), 1);
        let ctx = TemplateContext {
            goal: "",
            pattern: &pm,
            insights: None,
            nodes: &nodes,
        };
        assert_eq!(registry.build(&ctx).name, "tiny");
    }
}
