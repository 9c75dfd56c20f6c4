//! OpenAI-compatible chat-completions client.
//!
//! Works against any `/chat/completions` endpoint (Groq, OpenRouter, a local
//! llama.cpp or Ollama server). Each call sends a single user message.
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use exampaper_core::config::ModelSettings;
use exampaper_core::traits::TextGenerator;
use exampaper_core::LlmError;

pub struct ChatClient {
    client: Client,
    provider: String,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl ChatClient {
    pub fn new(settings: &ModelSettings) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| LlmError::RequestFailed { provider: settings.provider.clone(), reason: e.to_string() })?;
        if settings.api_key.is_none() {
            tracing::warn!(provider = %settings.provider, "no API key configured; requests are sent unauthenticated");
        }
        Ok(Self {
            client,
            provider: settings.provider.clone(),
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    pub fn model(&self) -> &str { &self.model }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<ChatResponse, LlmError> {
        let url = self.api_url("chat/completions");
        tracing::debug!(provider = %self.provider, model = %self.model, %url, "sending chat completion");

        let mut req = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }
        let response = req.send().await.map_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "chat completion request failed");
            LlmError::RequestFailed { provider: self.provider.clone(), reason: e.to_string() }
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        tracing::debug!(provider = %self.provider, %status, "chat completion response");

        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthFailed { provider: self.provider.clone() },
                429 => LlmError::RateLimited { provider: self.provider.clone() },
                _ => LlmError::RequestFailed { provider: self.provider.clone(), reason: format!("HTTP {status}: {text}") },
            });
        }
        serde_json::from_str(&text).map_err(|e| LlmError::InvalidResponse {
            provider: self.provider.clone(),
            reason: format!("JSON parse error: {e}"),
        })
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature,
        };
        let response = self.send(&request).await?;
        let choice = response.choices.into_iter().next().ok_or_else(|| LlmError::InvalidResponse {
            provider: self.provider.clone(),
            reason: "no choices in response".into(),
        })?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
