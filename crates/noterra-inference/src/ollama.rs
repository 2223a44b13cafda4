//! Ollama inference backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use noterra_core::{ChatMessage, Error, GenerationBackend, Result};

use crate::streaming::{ndjson_token_stream, ChatStreaming, TokenStream};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = noterra_core::defaults::OLLAMA_URL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = noterra_core::defaults::GEN_MODEL;

/// Ollama inference backend.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    gen_model: String,
    gen_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_OLLAMA_URL.to_string(),
            DEFAULT_GEN_MODEL.to_string(),
        )
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(base_url: String, gen_model: String) -> Self {
        let gen_timeout = std::env::var("NOTERRA_GEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(noterra_core::defaults::GEN_TIMEOUT_SECS);

        // Streamed responses can outlive the overall timeout, so the client
        // only bounds connection setup. Non-streaming calls set a per-request
        // timeout instead.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(
                noterra_core::defaults::STREAM_CONNECT_TIMEOUT_SECS,
            ))
            .build()
            .expect("Failed to create HTTP client");

        debug!(
            subsystem = "inference",
            component = "ollama",
            url = %base_url,
            model = %gen_model,
            "Initializing Ollama backend"
        );

        Self {
            client,
            base_url,
            gen_model,
            gen_timeout_secs: gen_timeout,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("NOTERRA_OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let gen_model =
            std::env::var("NOTERRA_GEN_MODEL").unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string());

        Self::with_config(base_url, gen_model)
    }

    fn wire_messages(system: &str, messages: &[ChatMessage]) -> Vec<WireMessage> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            wire.push(WireMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        for m in messages {
            wire.push(WireMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            });
        }
        wire
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct WireMessage {
    role: String,
    content: String,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

/// Response from the Ollama `/api/chat` endpoint (non-streaming).
#[derive(Deserialize)]
struct ChatResponse {
    message: WireMessage,
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    #[instrument(skip(self, system, input), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.gen_model, prompt_len = input.len()))]
    async fn generate_with_system(&self, system: &str, input: &str) -> Result<String> {
        let start = Instant::now();

        let messages = vec![ChatMessage {
            role: noterra_core::MessageRole::User,
            content: input.to_string(),
        }];
        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages: Self::wire_messages(system, &messages),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > 30000 {
            warn!(
                duration_ms = elapsed,
                prompt_len = input.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}

#[async_trait]
impl ChatStreaming for OllamaBackend {
    #[instrument(skip(self, system, messages), fields(subsystem = "inference", component = "ollama", op = "chat_stream", model = %self.gen_model, history_len = messages.len()))]
    async fn chat_stream(&self, system: &str, messages: &[ChatMessage]) -> Result<TokenStream> {
        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages: Self::wire_messages(system, messages),
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        Ok(ndjson_token_stream(response.bytes_stream()))
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}
