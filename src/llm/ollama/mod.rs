
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatMessage, ChatProvider};
use crate::config::OllamaConfig;
use crate::ollama::OllamaTransport;
use crate::{RagError, Result};

/// Chat client for Ollama's `/api/chat` endpoint with structured output
#[derive(Debug, Clone)]
pub struct OllamaChatClient {
    transport: OllamaTransport,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    format: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

impl OllamaChatClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> anyhow::Result<Self> {
        Ok(Self {
            transport: OllamaTransport::new(config)?,
            model: config.chat_model.clone(),
        })
    }

    #[inline]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[inline]
    pub fn with_transport(mut self, transport: OllamaTransport) -> Self {
        self.transport = transport;
        self
    }

    #[inline]
    pub fn transport(&self) -> &OllamaTransport {
        &self.transport
    }

    /// Test connection to the server and verify the chat model is installed
    #[inline]
    pub fn health_check(&self) -> anyhow::Result<()> {
        self.transport.health_check(&self.model)
    }

    fn request_chat(
        &self,
        messages: &[ChatMessage],
        format: &serde_json::Value,
    ) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            format,
        };

        let response_text = self
            .transport
            .post_json("/api/chat", &request)
            .context("Failed to get chat completion")?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        Ok(response.message.content)
    }
}

impl ChatProvider for OllamaChatClient {
    #[inline]
    fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    fn chat(&self, messages: &[ChatMessage], format: &serde_json::Value) -> Result<String> {
        debug!(
            "Sending {} messages to chat model {}",
            messages.len(),
            self.model
        );

        let content = self
            .request_chat(messages, format)
            .map_err(|e| RagError::Generation(format!("{:#}", e)))?;

        debug!("Chat reply length: {}", content.len());
        Ok(content)
    }
}
