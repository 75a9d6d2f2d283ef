use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use concord_config::LlmConfig;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new("http://localhost:11434")
    }
}

impl OpenRouterClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for OpenRouterClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenRouter,
}

impl Provider {
    /// Resolve the configured provider name (case-insensitive, defaults to Ollama).
    pub fn from_config(name: &str) -> Self {
        if name.eq_ignore_ascii_case("openrouter") {
            Self::OpenRouter
        } else {
            Self::Ollama
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LlmRouter {
    ollama: OllamaClient,
    openrouter: OpenRouterClient,
}

impl LlmRouter {
    pub fn new(ollama_base_url: impl Into<String>) -> Self {
        Self {
            ollama: OllamaClient::new(ollama_base_url),
            openrouter: OpenRouterClient::new(),
        }
    }

    pub async fn chat_with_fallback(
        &self,
        primary: Provider,
        ollama_model: &str,
        openrouter_model: &str,
        prompt: &str,
    ) -> Result<(Provider, String)> {
        match primary {
            Provider::Ollama => match self.ollama.chat_model(ollama_model, prompt).await {
                Ok(reply) => Ok((Provider::Ollama, reply)),
                Err(err) => {
                    debug!(%err, "ollama call failed, falling back to openrouter");
                    Ok((
                        Provider::OpenRouter,
                        self.openrouter.chat_model(openrouter_model, prompt).await?,
                    ))
                }
            },
            Provider::OpenRouter => Ok((
                Provider::OpenRouter,
                self.openrouter.chat_model(openrouter_model, prompt).await?,
            )),
        }
    }
}

impl OllamaClient {
    async fn chat_model(&self, model: &str, prompt: &str) -> Result<String> {
        let endpoint = format!("{}/api/generate", self.base_url.trim_end_matches('/'));

        let payload = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "format": "json"
        });

        let response = self.client.post(endpoint).json(&payload).send().await?;
        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("ollama error ({status}): {body}");
        }

        match body.get("response").and_then(|value| value.as_str()) {
            Some(content) => Ok(content.to_string()),
            None => bail!("ollama response missing text: {body}"),
        }
    }
}

impl OpenRouterClient {
    async fn chat_model(&self, model: &str, prompt: &str) -> Result<String> {
        let api_key = std::env::var("OPENROUTER_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            bail!("OPENROUTER_API_KEY is not set");
        }

        let payload = json!({
            "model": model,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        let response = self
            .client
            .post("https://openrouter.ai/api/v1/chat/completions")
            .bearer_auth(api_key)
            .header("X-Title", "Concord")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("openrouter error ({status}): {body}");
        }

        body.get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| anyhow::anyhow!("openrouter response missing content: {body}"))
    }
}

// ── Chat seam ─────────────────────────────────────────────────────────────────

/// A single-prompt completion capability.
///
/// Extractors depend on this trait rather than on [`LlmRouter`] so tests can
/// script replies without a model server.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// [`LlmRouter`] bound to the models named in [`LlmConfig`].
#[derive(Debug, Clone)]
pub struct RoutedChat {
    router: LlmRouter,
    primary: Provider,
    ollama_model: String,
    openrouter_model: String,
}

impl RoutedChat {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            router: LlmRouter::new(config.ollama_base_url.clone()),
            primary: Provider::from_config(&config.provider),
            ollama_model: config.ollama_model.clone(),
            openrouter_model: config.openrouter_model.clone(),
        }
    }
}

#[async_trait]
impl ChatModel for RoutedChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let (provider, reply) = self
            .router
            .chat_with_fallback(
                self.primary,
                &self.ollama_model,
                &self.openrouter_model,
                prompt,
            )
            .await?;
        debug!(?provider, reply_len = reply.len(), "model reply received");
        Ok(reply)
    }
}

// ── Structured output extraction ──────────────────────────────────────────────

/// Extract the first valid JSON object from an LLM response.
///
/// Looks for ` ```json\n...\n` ``` ` delimiters first, then falls back to the
/// span between the first `{` and the last `}`.  Returns `None` when neither
/// strategy yields JSON that deserializes into `T`.
///
/// ```rust
/// use concord_llm::extract_json_output;
///
/// #[derive(serde::Deserialize)]
/// struct Reply { facts: Vec<String> }
///
/// let raw = "Sure!\n```json\n{\"facts\":[\"lives in Lisbon\"]}\n```";
/// let reply: Reply = extract_json_output(raw).unwrap();
/// assert_eq!(reply.facts.len(), 1);
/// ```
pub fn extract_json_output<T: serde::de::DeserializeOwned>(response: &str) -> Option<T> {
    // Strategy 1: fenced ```json ... ``` blocks.
    if let Some(fence_start) = response.find("```json") {
        let after_fence = &response[fence_start + "```json".len()..];
        if let Some(json_start) = after_fence.find(|c: char| !c.is_whitespace()) {
            let json_body = &after_fence[json_start..];
            if let Some(fence_end) = json_body.find("```") {
                let json_str = json_body[..fence_end].trim();
                if let Ok(val) = serde_json::from_str(json_str) {
                    return Some(val);
                }
            }
        }
    }

    // Strategy 2: bare JSON object: first '{' to last '}'.
    let trimmed = response.trim();
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                let candidate = &trimmed[start..=end];
                if let Ok(val) = serde_json::from_str(candidate) {
                    return Some(val);
                }
            }
        }
    }

    None
}

// ── Tests ────────────────────────────────────────────────────────────────────
