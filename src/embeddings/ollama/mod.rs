
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Embedder;
use crate::config::OllamaConfig;
use crate::ollama::OllamaTransport;
use crate::{RagError, Result};

/// Embedding client for Ollama's `/api/embed` endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    transport: OllamaTransport,
    model: String,
    batch_size: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> anyhow::Result<Self> {
        Ok(Self {
            transport: OllamaTransport::new(config)?,
            model: config.embedding_model.clone(),
            batch_size: config.batch_size.max(1),
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

    /// Test connection to the server and verify the embedding model is installed
    #[inline]
    pub fn health_check(&self) -> anyhow::Result<()> {
        self.transport.health_check(&self.model)
    }

    fn request_embeddings(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response_text = self
            .transport
            .post_json("/api/embed", &request)
            .context("Failed to generate embeddings")?;

        let response: EmbedResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        if response.embeddings.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            ));
        }

        Ok(response.embeddings)
    }
}

impl Embedder for OllamaClient {
    #[inline]
    fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| RagError::Embedding("Ollama returned no embedding".to_string()))
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size()) {
            let embeddings = self
                .request_embeddings(batch)
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))
                .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;
            results.extend(embeddings);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    #[inline]
    fn batch_size(&self) -> usize {
        self.batch_size as usize
    }
}
