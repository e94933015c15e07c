//! REST client for the automation platform (n8n public API).
//!
//! - `GET  {catalog_path}`            node-type catalog
//! - `POST /api/v1/workflows`         create
//! - `GET  /api/v1/workflows/{id}`    fetch
//! - `PUT  /api/v1/workflows/{id}`    replace
//!
//! Server-managed fields are stripped before every create/update.

use async_trait::async_trait;
use flowsmith_core::error::PlatformError;
use flowsmith_core::platform::{AutomationPlatform, NodeTypeDescriptor};
use flowsmith_core::workflow::Workflow;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "X-N8N-API-KEY";

pub struct RestPlatformClient {
    base_url: String,
    api_key: Option<String>,
    catalog_path: String,
    client: reqwest::Client,
}

impl RestPlatformClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_options(base_url, api_key, "/types/nodes.json", Duration::from_secs(30))
    }

    pub fn with_options(
        base_url: impl Into<String>,
        api_key: Option<String>,
        catalog_path: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            catalog_path: catalog_path.into(),
            client,
        }
    }

    pub fn from_config(config: &flowsmith_config::PlatformConfig) -> Self {
        Self::with_options(
            &config.base_url,
            config.api_key.clone(),
            &config.catalog_path,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder, what: &str) -> Result<Value, PlatformError> {
        let response = builder
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        match status {
            200..=299 => response
                .json::<Value>()
                .await
                .map_err(|e| PlatformError::InvalidResponse(format!("{what}: {e}"))),
            401 | 403 => Err(PlatformError::AuthenticationFailed(format!(
                "{what}: check the platform API key"
            ))),
            404 => Err(PlatformError::NotFound(what.to_string())),
            _ => {
                let body = response.text().await.unwrap_or_default();
                warn!(status, what, body = %body, "Platform returned error");
                Err(PlatformError::ApiError {
                    status_code: status,
                    message: body,
                })
            }
        }
    }
}

/// Accept either a bare array or a `{ "data": [...] }` envelope.
fn parse_catalog(body: Value) -> Result<Vec<NodeTypeDescriptor>, PlatformError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(PlatformError::InvalidResponse(
                    "catalog response has no node list".into(),
                ));
            }
        },
        _ => {
            return Err(PlatformError::InvalidResponse(
                "catalog response is not a list".into(),
            ));
        }
    };

    let total = items.len();
    let descriptors: Vec<NodeTypeDescriptor> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if descriptors.len() < total {
        debug!(skipped = total - descriptors.len(), "Skipped malformed catalog entries");
    }
    Ok(descriptors)
}

/// Platform ids may be strings or numbers.
fn extract_id(body: &Value) -> Option<String> {
    match body.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn outgoing(workflow: &Workflow) -> Workflow {
    let mut clean = workflow.clone();
    clean.strip_server_fields();
    clean
}

#[async_trait]
impl AutomationPlatform for RestPlatformClient {
    async fn fetch_node_catalog(&self) -> Result<Vec<NodeTypeDescriptor>, PlatformError> {
        let body = self
            .send(self.request(reqwest::Method::GET, &self.catalog_path), "node catalog")
            .await?;
        let catalog = parse_catalog(body)?;
        debug!(count = catalog.len(), "Fetched node catalog");
        Ok(catalog)
    }

    async fn create_workflow(&self, workflow: &Workflow) -> Result<String, PlatformError> {
        let builder = self
            .request(reqwest::Method::POST, "/api/v1/workflows")
            .json(&outgoing(workflow));
        let body = self.send(builder, "create workflow").await?;
        let id = extract_id(&body)
            .ok_or_else(|| PlatformError::InvalidResponse("created workflow has no id".into()))?;
        info!(id = %id, name = %workflow.name, "Workflow created on platform");
        Ok(id)
    }

    async fn get_workflow(&self, id: &str) -> Result<Workflow, PlatformError> {
        let path = format!("/api/v1/workflows/{id}");
        let body = self
            .send(self.request(reqwest::Method::GET, &path), &format!("workflow {id}"))
            .await?;
        serde_json::from_value(body).map_err(|e| PlatformError::InvalidResponse(e.to_string()))
    }

    async fn update_workflow(&self, id: &str, workflow: &Workflow) -> Result<(), PlatformError> {
        let path = format!("/api/v1/workflows/{id}");
        let builder = self
            .request(reqwest::Method::PUT, &path)
            .json(&outgoing(workflow));
        self.send(builder, &format!("workflow {id}")).await?;
        info!(id, name = %workflow.name, "Workflow updated on platform");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_accepts_bare_array() {
        let catalog = parse_catalog(json!([
            {"name": "n8n-nodes-base.slack", "displayName": "Slack", "version": 2},
            {"name": "n8n-nodes-base.webhook", "displayName": "Webhook", "version": [1, 2]}
        ]))
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[1].display_name, "Webhook");
    }

    #[test]
    fn catalog_accepts_data_envelope_and_skips_malformed() {
        let catalog = parse_catalog(json!({
            "data": [
                {"name": "n8n-nodes-base.slack", "displayName": "Slack", "version": 2},
                {"displayName": "no name"}
            ]
        }))
        .unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn catalog_rejects_scalars() {
        assert!(parse_catalog(json!("nope")).is_err());
        assert!(parse_catalog(json!({"items": []})).is_err());
    }

    #[test]
    fn ids_can_be_strings_or_numbers() {
        assert_eq!(extract_id(&json!({"id": "abc"})).as_deref(), Some("abc"));
        assert_eq!(extract_id(&json!({"id": 17})).as_deref(), Some("17"));
        assert!(extract_id(&json!({"name": "x"})).is_none());
    }

    #[test]
    fn outgoing_workflow_has_no_server_fields() {
        let mut wf = Workflow::new("w");
        wf.extra.insert("id".into(), json!("1"));
        wf.extra.insert("updatedAt".into(), json!("2024-01-01"));
        let clean = outgoing(&wf);
        assert!(clean.server_managed_fields().is_empty());
        assert_eq!(wf.server_managed_fields().len(), 2);
    }

    #[test]
    fn url_joins_with_and_without_slash() {
        let c = RestPlatformClient::new("http://n8n:5678/", None);
        assert_eq!(c.url("/api/v1/workflows"), "http://n8n:5678/api/v1/workflows");
        assert_eq!(c.url("types/nodes.json"), "http://n8n:5678/types/nodes.json");
    }
}
