//! OpenRouter chat-completions adapter.
//!
//! A [`ReasoningClient`] sends one chunk of a document, wrapped in the
//! structured analysis prompt, to the configured endpoint and returns the
//! model's text. Every failure mode maps to a distinct [`LexRiskError`]
//! variant so the orchestrator can surface it unchanged.

pub mod prompts;

use std::time::Duration;

use lexrisk_shared::{LexRiskError, OpenRouterConfig, Result, validate_api_key};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// User-Agent string for reasoning requests.
const USER_AGENT: &str = concat!("LexRisk/", env!("CARGO_PKG_VERSION"));

/// How much of an error body is kept in [`LexRiskError::UpstreamStatus`].
const ERROR_BODY_PREVIEW: usize = 200;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// ReasoningClient
// ---------------------------------------------------------------------------

/// Client for a single OpenRouter-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ReasoningClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    referer: String,
    title: String,
}

impl ReasoningClient {
    /// Build a client, reading the API key from the env var named in `config`.
    pub fn from_config(config: &OpenRouterConfig) -> Result<Self> {
        let api_key = validate_api_key(config)?;
        Self::with_api_key(config, api_key)
    }

    /// Build a client with an explicit API key.
    pub fn with_api_key(config: &OpenRouterConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LexRiskError::config("OpenRouter API key is empty"));
        }

        let endpoint = config.endpoint_url()?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LexRiskError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            referer: config.referer.clone(),
            title: config.title.clone(),
        })
    }

    /// Model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Analyze one chunk. Exactly one HTTP request is made.
    #[instrument(skip_all, fields(model = %self.model, chars = chunk.chars().count()))]
    pub async fn analyze(&self, chunk: &str) -> Result<String> {
        let user_prompt = prompts::user_prompt(chunk);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompts::SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(endpoint = %self.endpoint, "sending chunk to reasoning service");

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        debug!(status = status.as_u16(), bytes = body.len(), "reasoning service responded");

        if !status.is_success() {
            return Err(LexRiskError::UpstreamStatus {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        extract_content(&body)
    }
}

/// Pull the first choice's content out of a chat-completions body.
fn extract_content(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| LexRiskError::MalformedResponse(format!("{e} (got: {})", preview(body))))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(LexRiskError::EmptyResult);
    }

    Ok(content)
}

fn transport_error(e: reqwest::Error) -> LexRiskError {
    if e.is_timeout() {
        LexRiskError::Transport(format!("request timed out: {e}"))
    } else {
        LexRiskError::Transport(e.to_string())
    }
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW).collect()
}
