//! Built-in pattern library and optional user-supplied patterns.

use flowsmith_core::error::AgentError;
use flowsmith_core::pattern::{Complexity, Pattern};
use serde::Deserialize;
use std::path::Path;

fn pattern(
    id: &str,
    name: &str,
    description: &str,
    keywords: &[&str],
    suggested_nodes: &[&str],
    complexity: Complexity,
) -> Pattern {
    Pattern {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        suggested_nodes: suggested_nodes.iter().map(|s| s.to_string()).collect(),
        complexity,
    }
}

/// The patterns every agent starts with.
pub fn builtin_patterns() -> Vec<Pattern> {
    vec![
        pattern(
            "slack-notification",
            "Slack Notification",
            "Send a Slack message when an event occurs, such as a database change or a webhook call",
            &[
                "slack", "alert", "notification", "notify", "message", "channel", "send",
                "database", "row", "change", "changes", "event",
            ],
            &[
                "n8n-nodes-base.postgresTrigger",
                "n8n-nodes-base.set",
                "n8n-nodes-base.slack",
            ],
            Complexity::Simple,
        ),
        pattern(
            "webhook-to-http",
            "Webhook to HTTP Request",
            "Receive a webhook, transform the payload and forward it to another HTTP API",
            &["webhook", "http", "api", "request", "forward", "endpoint", "payload", "post"],
            &[
                "n8n-nodes-base.webhook",
                "n8n-nodes-base.set",
                "n8n-nodes-base.httpRequest",
                "n8n-nodes-base.respondToWebhook",
            ],
            Complexity::Medium,
        ),
        pattern(
            "scheduled-report",
            "Scheduled Report",
            "Collect data on a schedule and deliver a summary report",
            &[
                "schedule", "daily", "weekly", "report", "summary", "cron", "every", "morning",
            ],
            &[
                "n8n-nodes-base.scheduleTrigger",
                "n8n-nodes-base.httpRequest",
                "n8n-nodes-base.code",
                "n8n-nodes-base.emailSend",
            ],
            Complexity::Medium,
        ),
        pattern(
            "email-digest",
            "Email Digest",
            "Read incoming email, summarize it and send a digest",
            &["email", "inbox", "digest", "gmail", "mail", "imap", "summarize"],
            &[
                "n8n-nodes-base.emailReadImap",
                "n8n-nodes-base.code",
                "n8n-nodes-base.emailSend",
            ],
            Complexity::Simple,
        ),
        pattern(
            "database-sync",
            "Database Sync",
            "Keep two data stores in sync by copying new or changed records",
            &[
                "sync", "synchronize", "database", "postgres", "mysql", "copy", "replicate",
                "record", "table",
            ],
            &[
                "n8n-nodes-base.scheduleTrigger",
                "n8n-nodes-base.postgres",
                "n8n-nodes-base.if",
                "n8n-nodes-base.mySql",
            ],
            Complexity::Medium,
        ),
        pattern(
            "form-to-crm",
            "Form to CRM",
            "Capture form submissions and create or update contacts in a CRM",
            &["form", "submission", "crm", "lead", "contact", "hubspot", "salesforce", "signup"],
            &[
                "n8n-nodes-base.formTrigger",
                "n8n-nodes-base.set",
                "n8n-nodes-base.hubspot",
            ],
            Complexity::Simple,
        ),
        pattern(
            "ai-chat-assistant",
            "AI Chat Assistant",
            "Answer chat messages with a language-model agent that keeps conversation memory",
            &[
                "ai", "chat", "chatbot", "assistant", "llm", "openai", "gpt", "conversation",
                "answer",
            ],
            &[
                "@n8n/n8n-nodes-langchain.chatTrigger",
                "@n8n/n8n-nodes-langchain.agent",
                "@n8n/n8n-nodes-langchain.lmChatOpenAi",
                "@n8n/n8n-nodes-langchain.memoryBufferWindow",
            ],
            Complexity::Medium,
        ),
        pattern(
            "file-backup",
            "File Backup",
            "Copy files to cloud storage on a schedule",
            &["backup", "file", "upload", "storage", "s3", "drive", "dropbox", "archive"],
            &[
                "n8n-nodes-base.scheduleTrigger",
                "n8n-nodes-base.readWriteFile",
                "n8n-nodes-base.awsS3",
            ],
            Complexity::Simple,
        ),
        pattern(
            "rss-monitor",
            "RSS Monitor",
            "Watch an RSS feed and post new items to a chat channel",
            &["rss", "feed", "news", "blog", "monitor", "article", "post", "telegram"],
            &[
                "n8n-nodes-base.rssFeedReadTrigger",
                "n8n-nodes-base.filter",
                "n8n-nodes-base.telegram",
            ],
            Complexity::Simple,
        ),
        pattern(
            "error-alerting",
            "Error Alerting",
            "Notify the team whenever another workflow fails",
            &["error", "failure", "fail", "exception", "incident", "alert", "monitor", "oncall"],
            &[
                "n8n-nodes-base.errorTrigger",
                "n8n-nodes-base.set",
                "n8n-nodes-base.slack",
                "n8n-nodes-base.emailSend",
            ],
            Complexity::Medium,
        ),
    ]
}

#[derive(Deserialize)]
struct PatternFile {
    #[serde(default)]
    patterns: Vec<Pattern>,
}

/// Load additional patterns from a JSON or TOML file.
///
/// JSON files may hold either a bare array or `{ "patterns": [...] }`;
/// TOML files use `[[patterns]]` tables.
pub fn load_patterns_file(path: &Path) -> Result<Vec<Pattern>, AgentError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AgentError::InvalidInput(format!("{}: {e}", path.display())))?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        let file: PatternFile = toml::from_str(&content)
            .map_err(|e| AgentError::InvalidInput(format!("{}: {e}", path.display())))?;
        return Ok(file.patterns);
    }

    match serde_json::from_str::<Vec<Pattern>>(&content) {
        Ok(patterns) => Ok(patterns),
        Err(_) => Ok(serde_json::from_str::<PatternFile>(&content)?.patterns),
    }
}

/// Built-in patterns, with `extra` appended. An extra pattern whose id
/// matches a built-in replaces it in place.
pub fn merge_patterns(mut base: Vec<Pattern>, extra: Vec<Pattern>) -> Vec<Pattern> {
    for pattern in extra {
        match base.iter_mut().find(|p| p.id == pattern.id) {
            Some(existing) => *existing = pattern,
            None => base.push(pattern),
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn builtin_library_has_unique_ids() {
        let patterns = builtin_patterns();
        assert_eq!(patterns.len(), 10);
        let ids: HashSet<_> = patterns.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), patterns.len());
        assert!(patterns.iter().all(|p| !p.keywords.is_empty()));
    }

    #[test]
    fn loads_json_array_and_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let array = dir.path().join("a.json");
        std::fs::write(
            &array,
            r#"[{"id": "x", "name": "X", "description": "d", "keywords": ["x"]}]"#,
        )
        .unwrap();
        let envelope = dir.path().join("b.json");
        std::fs::write(
            &envelope,
            r#"{"patterns": [{"id": "y", "name": "Y", "description": "d", "complexity": "complex"}]}"#,
        )
        .unwrap();

        assert_eq!(load_patterns_file(&array).unwrap()[0].id, "x");
        let y = load_patterns_file(&envelope).unwrap();
        assert_eq!(y[0].complexity, Complexity::Complex);
    }

    #[test]
    fn loads_toml_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.toml");
        std::fs::write(
            &path,
            r#"
[[patterns]]
id = "invoice-processing"
name = "Invoice Processing"
description = "Extract invoice data"
keywords = ["invoice", "pdf"]
suggested_nodes = ["n8n-nodes-base.emailReadImap"]
complexity = "medium"
"#,
        )
        .unwrap();
        let patterns = load_patterns_file(&path).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].keywords, vec!["invoice", "pdf"]);
    }

    #[test]
    fn missing_file_is_invalid_input() {
        let err = load_patterns_file(Path::new("/nonexistent/patterns.json")).unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
    }

    #[test]
    fn merge_replaces_by_id_and_appends_new() {
        let mut replacement = builtin_patterns()[0].clone();
        replacement.description = "custom".into();
        let mut extra = builtin_patterns()[1].clone();
        extra.id = "brand-new".into();

        let merged = merge_patterns(builtin_patterns(), vec![replacement, extra]);
        assert_eq!(merged.len(), 11);
        assert_eq!(merged[0].description, "custom");
        assert_eq!(merged[10].id, "brand-new");
    }
}
