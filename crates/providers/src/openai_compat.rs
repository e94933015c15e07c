//! OpenAI-compatible generation and embedding client.
//!
//! Talks to any endpoint exposing `POST /chat/completions` and
//! `POST /embeddings` with bearer auth (OpenAI, OpenRouter, vLLM, Ollama).

use async_trait::async_trait;
use flowsmith_core::error::ProviderError;
use flowsmith_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    embedding_model: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct EmbeddingBody<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingList {
    model: String,
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl OpenAiCompatProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            embedding_model: None,
            client,
        }
    }

    /// Enable embeddings with the given model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        warn!(provider = %self.name, status, path, "Provider returned error");
        Err(status_error(status, retry_after, body))
    }
}

fn chat_messages(request: &ProviderRequest) -> Vec<ChatMessage<'_>> {
    let system = request.system.as_deref().map(|content| ChatMessage {
        role: "system",
        content,
    });
    system
        .into_iter()
        .chain(std::iter::once(ChatMessage {
            role: "user",
            content: &request.prompt,
        }))
        .collect()
}

fn status_error(status: u16, retry_after: Option<u64>, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        401 | 403 => ProviderError::AuthenticationFailed(
            "invalid API key or insufficient permissions".into(),
        ),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

fn malformed(what: &str, reason: impl std::fmt::Display) -> ProviderError {
    ProviderError::ApiError {
        status_code: 200,
        message: format!("malformed {what} response: {reason}"),
    }
}

fn completion_into_response(completion: ChatCompletion) -> Result<ProviderResponse, ProviderError> {
    let text = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| malformed("completion", "no choices"))?
        .message
        .content
        .unwrap_or_default();
    Ok(ProviderResponse {
        text,
        model: completion.model,
        usage: completion.usage,
    })
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn supports_embeddings(&self) -> bool {
        self.is_available().await && self.embedding_model.is_some()
    }

    async fn generate(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = ChatBody {
            model: &request.model,
            messages: chat_messages(&request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };
        debug!(provider = %self.name, model = %request.model, "Completion request");

        let completion: ChatCompletion = self
            .post("/chat/completions", &body)
            .await?
            .json()
            .await
            .map_err(|e| malformed("completion", e))?;
        completion_into_response(completion)
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let body = EmbeddingBody {
            model: &request.model,
            input: &request.inputs,
            encoding_format: "float",
        };
        debug!(provider = %self.name, model = %request.model, count = request.inputs.len(), "Embedding request");

        let list: EmbeddingList = self
            .post("/embeddings", &body)
            .await?
            .json()
            .await
            .map_err(|e| malformed("embedding", e))?;

        if list.data.len() != request.inputs.len() {
            return Err(malformed(
                "embedding",
                format!("{} vectors for {} inputs", list.data.len(), request.inputs.len()),
            ));
        }

        Ok(EmbeddingResponse {
            embeddings: list.data.into_iter().map(|d| d.embedding).collect(),
            model: list.model,
        })
    }
}
