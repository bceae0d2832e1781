// LLM module
// Chat provider interface, typed content schemas and the campaign assistant

pub mod assistant;
pub mod ollama;
pub mod schemas;


pub use assistant::{Assistant, GENERATION_PREFIX, generation_query};
pub use ollama::OllamaChatClient;
pub use schemas::{ContentKind, ContentSchema, GeneratedContent};

use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A chat model that answers with JSON constrained by a schema
pub trait ChatProvider: Send + Sync {
    fn model(&self) -> &str;

    /// Send the conversation and return the raw text of the reply.
    /// `format` is the JSON schema the reply should follow.
    fn chat(&self, messages: &[ChatMessage], format: &serde_json::Value) -> Result<String>;
}
