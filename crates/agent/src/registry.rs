//! Node-type registry — static knowledge of the platform's node catalog.
//!
//! Classifies a node type as trigger-class (an entry point), action-class
//! (does work), or unclassified (flow control, annotations, unknown).
//! The registry is necessarily incomplete; the remote catalog evolves.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    Trigger,
    Action,
    Unclassified,
}

#[derive(Debug, Clone)]
pub struct NodeTypeInfo {
    pub class: NodeClass,
    pub display_name: String,
}

use NodeClass::{Action, Trigger, Unclassified};

const BUILTIN: &[(&str, NodeClass, &str)] = &[
    // Triggers
    ("n8n-nodes-base.manualTrigger", Trigger, "Manual Trigger"),
    ("n8n-nodes-base.scheduleTrigger", Trigger, "Schedule Trigger"),
    ("n8n-nodes-base.cron", Trigger, "Cron"),
    ("n8n-nodes-base.interval", Trigger, "Interval"),
    ("n8n-nodes-base.webhook", Trigger, "Webhook"),
    ("n8n-nodes-base.formTrigger", Trigger, "Form Trigger"),
    ("n8n-nodes-base.emailReadImap", Trigger, "Email Trigger (IMAP)"),
    ("n8n-nodes-base.rssFeedReadTrigger", Trigger, "RSS Feed Trigger"),
    ("n8n-nodes-base.postgresTrigger", Trigger, "Postgres Trigger"),
    ("n8n-nodes-base.errorTrigger", Trigger, "Error Trigger"),
    ("n8n-nodes-base.executeWorkflowTrigger", Trigger, "Execute Workflow Trigger"),
    ("n8n-nodes-base.googleSheetsTrigger", Trigger, "Google Sheets Trigger"),
    ("n8n-nodes-base.githubTrigger", Trigger, "GitHub Trigger"),
    ("n8n-nodes-base.slackTrigger", Trigger, "Slack Trigger"),
    ("n8n-nodes-base.telegramTrigger", Trigger, "Telegram Trigger"),
    ("n8n-nodes-base.localFileTrigger", Trigger, "Local File Trigger"),
    ("@n8n/n8n-nodes-langchain.chatTrigger", Trigger, "Chat Trigger"),
    // Actions
    ("n8n-nodes-base.slack", Action, "Slack"),
    ("n8n-nodes-base.httpRequest", Action, "HTTP Request"),
    ("n8n-nodes-base.respondToWebhook", Action, "Respond to Webhook"),
    ("n8n-nodes-base.emailSend", Action, "Send Email"),
    ("n8n-nodes-base.gmail", Action, "Gmail"),
    ("n8n-nodes-base.postgres", Action, "Postgres"),
    ("n8n-nodes-base.mySql", Action, "MySQL"),
    ("n8n-nodes-base.mongoDb", Action, "MongoDB"),
    ("n8n-nodes-base.redis", Action, "Redis"),
    ("n8n-nodes-base.googleSheets", Action, "Google Sheets"),
    ("n8n-nodes-base.googleDrive", Action, "Google Drive"),
    ("n8n-nodes-base.awsS3", Action, "AWS S3"),
    ("n8n-nodes-base.dropbox", Action, "Dropbox"),
    ("n8n-nodes-base.ftp", Action, "FTP"),
    ("n8n-nodes-base.readWriteFile", Action, "Read/Write Files from Disk"),
    ("n8n-nodes-base.rssFeedRead", Action, "RSS Read"),
    ("n8n-nodes-base.set", Action, "Edit Fields (Set)"),
    ("n8n-nodes-base.code", Action, "Code"),
    ("n8n-nodes-base.function", Action, "Function"),
    ("n8n-nodes-base.html", Action, "HTML"),
    ("n8n-nodes-base.markdown", Action, "Markdown"),
    ("n8n-nodes-base.dateTime", Action, "Date & Time"),
    ("n8n-nodes-base.crypto", Action, "Crypto"),
    ("n8n-nodes-base.compression", Action, "Compression"),
    ("n8n-nodes-base.telegram", Action, "Telegram"),
    ("n8n-nodes-base.discord", Action, "Discord"),
    ("n8n-nodes-base.microsoftTeams", Action, "Microsoft Teams"),
    ("n8n-nodes-base.twilio", Action, "Twilio"),
    ("n8n-nodes-base.airtable", Action, "Airtable"),
    ("n8n-nodes-base.notion", Action, "Notion"),
    ("n8n-nodes-base.hubspot", Action, "HubSpot"),
    ("n8n-nodes-base.salesforce", Action, "Salesforce"),
    ("n8n-nodes-base.jira", Action, "Jira"),
    ("n8n-nodes-base.github", Action, "GitHub"),
    ("n8n-nodes-base.trello", Action, "Trello"),
    ("n8n-nodes-base.stopAndError", Action, "Stop and Error"),
    ("n8n-nodes-base.openAi", Action, "OpenAI"),
    ("@n8n/n8n-nodes-langchain.agent", Action, "AI Agent"),
    ("@n8n/n8n-nodes-langchain.lmChatOpenAi", Action, "OpenAI Chat Model"),
    ("@n8n/n8n-nodes-langchain.memoryBufferWindow", Action, "Window Buffer Memory"),
    // Flow control and annotations
    ("n8n-nodes-base.if", Unclassified, "If"),
    ("n8n-nodes-base.switch", Unclassified, "Switch"),
    ("n8n-nodes-base.merge", Unclassified, "Merge"),
    ("n8n-nodes-base.splitInBatches", Unclassified, "Loop Over Items"),
    ("n8n-nodes-base.wait", Unclassified, "Wait"),
    ("n8n-nodes-base.noOp", Unclassified, "No Operation"),
    ("n8n-nodes-base.filter", Unclassified, "Filter"),
    ("n8n-nodes-base.stickyNote", Unclassified, "Sticky Note"),
];

/// Lookup table from node type to classification.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    types: HashMap<String, NodeTypeInfo>,
}

impl NodeRegistry {
    /// The built-in registry.
    pub fn builtin() -> Self {
        let types = BUILTIN
            .iter()
            .map(|(ty, class, display)| {
                (
                    ty.to_string(),
                    NodeTypeInfo {
                        class: *class,
                        display_name: display.to_string(),
                    },
                )
            })
            .collect();
        Self { types }
    }

    /// Register or replace a node type.
    pub fn with_type(mut self, node_type: &str, class: NodeClass, display_name: &str) -> Self {
        self.types.insert(
            node_type.to_string(),
            NodeTypeInfo {
                class,
                display_name: display_name.to_string(),
            },
        );
        self
    }

    pub fn is_known(&self, node_type: &str) -> bool {
        self.types.contains_key(node_type)
    }

    pub fn get(&self, node_type: &str) -> Option<&NodeTypeInfo> {
        self.types.get(node_type)
    }

    /// Classify a node type.
    ///
    /// Unlisted types whose last segment ends in `trigger` (any case) are
    /// trigger-class; other unlisted types are unclassified.
    pub fn classify(&self, node_type: &str) -> NodeClass {
        if let Some(info) = self.types.get(node_type) {
            return info.class;
        }
        let local = node_type.rsplit('.').next().unwrap_or(node_type);
        if local.to_lowercase().ends_with("trigger") {
            NodeClass::Trigger
        } else {
            NodeClass::Unclassified
        }
    }

    /// Display name for a type, falling back to its last segment.
    pub fn display_name(&self, node_type: &str) -> String {
        match self.types.get(node_type) {
            Some(info) => info.display_name.clone(),
            None => node_type
                .rsplit('.')
                .next()
                .unwrap_or(node_type)
                .to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_classifies_known_types() {
        let reg = NodeRegistry::builtin();
        assert_eq!(reg.classify("n8n-nodes-base.webhook"), NodeClass::Trigger);
        assert_eq!(reg.classify("n8n-nodes-base.slack"), NodeClass::Action);
        assert_eq!(reg.classify("n8n-nodes-base.if"), NodeClass::Unclassified);
    }

    #[test]
    fn unlisted_trigger_suffix_is_trigger() {
        let reg = NodeRegistry::builtin();
        assert!(!reg.is_known("n8n-nodes-base.stripeTrigger"));
        assert_eq!(reg.classify("n8n-nodes-base.stripeTrigger"), NodeClass::Trigger);
        assert_eq!(reg.classify("n8n-nodes-base.stripe"), NodeClass::Unclassified);
    }

    #[test]
    fn display_name_falls_back_to_last_segment() {
        let reg = NodeRegistry::builtin();
        assert_eq!(reg.display_name("n8n-nodes-base.slack"), "Slack");
        assert_eq!(reg.display_name("acme.widget"), "widget");
    }

    #[test]
    fn with_type_extends_registry() {
        let reg = NodeRegistry::builtin().with_type("acme.widget", NodeClass::Action, "Widget");
        assert_eq!(reg.classify("acme.widget"), NodeClass::Action);
        assert!(reg.len() > BUILTIN.len() - 1);
    }
}
