use std::time::Duration;

use async_trait::async_trait;
use prscope_core::{PrscopeConfig, PrscopeError, ProviderKind};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_OPENAI_COMPAT_URL: &str = "http://localhost:1234";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A message in a chat conversation with the model.
///
/// # Examples
///
/// ```
/// use prscope_review::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("Review this code");
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use prscope_review::llm::Role;
///
/// let role = Role::System;
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// A model advertised by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    /// Human-readable name; the id when the provider has none.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
}

/// A chat-completion backend.
///
/// One call per review; implementations do not retry.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send the conversation and return the assistant's text.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, PrscopeError>;

    /// List the models the provider offers.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, PrscopeError>;

    /// Model name requests are sent with.
    fn model(&self) -> &str;
}

/// Build the provider selected by `config`.
///
/// The API key is read from the environment variable named by
/// `config.api_key_env`. OpenAI and Anthropic refuse to start without one.
///
/// # Errors
///
/// Returns [`PrscopeError::Config`] when a required API key is missing, or
/// [`PrscopeError::Llm`] if the HTTP client cannot be built.
///
/// # Examples
///
/// ```
/// use prscope_core::{PrscopeConfig, ProviderKind};
/// use prscope_review::llm::create_provider;
///
/// let config = PrscopeConfig::new(ProviderKind::Ollama, "llama3.1", "UNUSED_KEY_VAR");
/// let provider = create_provider(&config).unwrap();
/// assert_eq!(provider.model(), "llama3.1");
/// ```
pub fn create_provider(config: &PrscopeConfig) -> Result<Box<dyn ChatProvider>, PrscopeError> {
    let api_key = config.api_key();
    if api_key.is_none() && config.provider.requires_api_key() {
        return Err(PrscopeError::Config(format!(
            "{} is not set; the {} provider needs an API key",
            config.api_key_env, config.provider
        )));
    }
    let base_url = config.base_url.as_deref();
    let model = config.model.clone();

    let provider: Box<dyn ChatProvider> = match config.provider {
        ProviderKind::OpenAi => Box::new(
            OpenAiClient::new(base_url.unwrap_or(DEFAULT_OPENAI_URL), model, api_key)?
                .with_json_mode(true),
        ),
        ProviderKind::OpenAiCompat => Box::new(OpenAiClient::new(
            base_url.unwrap_or(DEFAULT_OPENAI_COMPAT_URL),
            model,
            api_key,
        )?),
        ProviderKind::Anthropic => Box::new(AnthropicClient::new(
            base_url.unwrap_or(DEFAULT_ANTHROPIC_URL),
            model,
            api_key.unwrap_or_default(),
        )?),
        ProviderKind::Ollama => Box::new(OllamaClient::new(
            base_url.unwrap_or(DEFAULT_OLLAMA_URL),
            model,
        )?),
    };
    Ok(provider)
}

fn http_client() -> Result<reqwest::Client, PrscopeError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| PrscopeError::Llm(format!("failed to create HTTP client: {e}")))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}

async fn send_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, PrscopeError> {
    let response = request
        .send()
        .await
        .map_err(|e| PrscopeError::Llm(format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(PrscopeError::Llm(format!("LLM API error {status}: {body_text}")));
    }

    response
        .json()
        .await
        .map_err(|e| PrscopeError::Llm(format!("failed to parse response: {e}")))
}

/// OpenAI chat completions client.
///
/// Works with OpenAI itself and with any server that exposes
/// `/v1/chat/completions` (LM Studio, vLLM, LiteLLM). JSON response format is
/// only requested when enabled, since many compatible servers reject it.
///
/// # Examples
///
/// ```
/// use prscope_review::llm::{ChatProvider, OpenAiClient};
///
/// let client = OpenAiClient::new("https://api.openai.com", "gpt-4o-mini", Some("sk-test".into()))
///     .unwrap()
///     .with_json_mode(true);
/// assert_eq!(client.model(), "gpt-4o-mini");
/// ```
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    json_mode: bool,
}

impl OpenAiClient {
    /// # Errors
    ///
    /// Returns [`PrscopeError::Llm`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, PrscopeError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            json_mode: false,
        })
    }

    /// Ask for `response_format: json_object`.
    pub fn with_json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.1,
        });
        if self.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiModelList {
    data: Vec<OpenAiModel>,
}

#[derive(Deserialize)]
struct OpenAiModel {
    id: String,
    created: Option<i64>,
    owned_by: Option<String>,
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, PrscopeError> {
        let url = endpoint(&self.base_url, "/v1/chat/completions");
        let request = self.authorize(self.client.post(&url)).json(&self.request_body(messages));
        let response: OpenAiChatResponse = send_json(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PrscopeError::Llm("response contained no message content".into()))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, PrscopeError> {
        let url = endpoint(&self.base_url, "/v1/models");
        let list: OpenAiModelList = send_json(self.authorize(self.client.get(&url))).await?;
        Ok(list
            .data
            .into_iter()
            .map(|m| ModelInfo {
                name: m.id.clone(),
                id: m.id,
                created: m.created,
                owned_by: m.owned_by,
            })
            .collect())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Anthropic Messages API client.
///
/// System messages are lifted into the request's `system` field; the rest
/// are sent as the conversation.
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl AnthropicClient {
    /// # Errors
    ///
    /// Returns [`PrscopeError::Llm`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, PrscopeError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn request_body<'a>(&'a self, messages: &'a [ChatMessage]) -> AnthropicRequest<'a> {
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        AnthropicRequest {
            model: &self.model,
            max_tokens: ANTHROPIC_MAX_TOKENS,
            system: (!system.is_empty()).then_some(system),
            messages: messages.iter().filter(|m| m.role != Role::System).collect(),
        }
    }

    fn headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<&'a ChatMessage>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicModelList {
    data: Vec<AnthropicModel>,
}

#[derive(Deserialize)]
struct AnthropicModel {
    id: String,
    display_name: Option<String>,
}

#[async_trait]
impl ChatProvider for AnthropicClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, PrscopeError> {
        let url = endpoint(&self.base_url, "/v1/messages");
        let request = self.headers(self.client.post(&url)).json(&self.request_body(messages));
        let response: AnthropicResponse = send_json(request).await?;

        let text = response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(PrscopeError::Llm("response contained no text blocks".into()));
        }
        Ok(text)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, PrscopeError> {
        let url = endpoint(&self.base_url, "/v1/models");
        let list: AnthropicModelList = send_json(self.headers(self.client.get(&url))).await?;
        Ok(list
            .data
            .into_iter()
            .map(|m| ModelInfo {
                name: m.display_name.unwrap_or_else(|| m.id.clone()),
                id: m.id,
                created: None,
                owned_by: Some("anthropic".into()),
            })
            .collect())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Ollama native chat client (`/api/chat`, non-streaming).
pub struct OllamaClient {
    client: reqwest::Client,
    host: String,
    model: String,
}

impl OllamaClient {
    /// # Errors
    ///
    /// Returns [`PrscopeError::Llm`] if the HTTP client cannot be built.
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Result<Self, PrscopeError> {
        Ok(Self {
            client: http_client()?,
            host: host.into(),
            model: model.into(),
        })
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    format: &'static str,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Deserialize)]
struct OllamaTags {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[async_trait]
impl ChatProvider for OllamaClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, PrscopeError> {
        let url = endpoint(&self.host, "/api/chat");
        let body = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            format: "json",
        };
        let response: OllamaChatResponse = send_json(self.client.post(&url).json(&body)).await?;
        Ok(response.message.content)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, PrscopeError> {
        let url = endpoint(&self.host, "/api/tags");
        let tags: OllamaTags = send_json(self.client.get(&url)).await?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
                created: None,
                owned_by: Some("ollama".into()),
            })
            .collect())
    }

    fn model(&self) -> &str {
        &self.model
    }
}
