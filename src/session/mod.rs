// Session module
// One index and one assistant, built together and shared by every request

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::Config;
use crate::embeddings::{Embedder, OllamaClient};
use crate::indexer::{BuildReport, ChunkIndex, Inspection, Retrieval};
use crate::llm::schemas::Answer;
use crate::llm::{Assistant, ChatProvider, ContentKind, GeneratedContent, OllamaChatClient};
use crate::{RagError, Result};

/// Overrides for building a session; unset fields fall back to config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupRequest {
    pub model_embed: Option<String>,
    pub model_chat: Option<String>,
    pub db_path: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: Option<String>,
    pub top_k: Option<usize>,
}

impl QueryRequest {
    #[inline]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            top_k: None,
        }
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// Settings resolved from config plus a `SetupRequest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSettings {
    pub model_embed: String,
    pub model_chat: String,
    pub db_path: PathBuf,
    pub source_dir: Option<PathBuf>,
    pub collection_name: Option<String>,
    pub top_k: usize,
    pub max_retries: u32,
}

impl SessionSettings {
    #[inline]
    pub fn resolve(config: &Config, request: SetupRequest) -> Self {
        let db_path = match request.db_path {
            Some(path) if path.is_absolute() => path,
            Some(path) => config.get_base_dir().join(path),
            None => config.vector_database_path(),
        };
        let source_dir = request.source_dir.or_else(|| config.rag.source_dir.clone());

        Self {
            model_embed: request
                .model_embed
                .unwrap_or_else(|| config.ollama.embedding_model.clone()),
            model_chat: request
                .model_chat
                .unwrap_or_else(|| config.ollama.chat_model.clone()),
            collection_name: source_dir.as_deref().and_then(collection_name_from_dir),
            db_path,
            source_dir,
            top_k: config.rag.top_k,
            max_retries: config.rag.max_retries,
        }
    }
}

/// Collection name derived from the source directory's last component
#[inline]
pub fn collection_name_from_dir(dir: &Path) -> Option<String> {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.trim().is_empty())
}

/// A built index plus the assistant that answers from it
pub struct Session {
    index: RwLock<ChunkIndex>,
    assistant: Assistant,
    settings: SessionSettings,
}

impl Session {
    /// Build the collection from the source directory with Ollama providers
    #[inline]
    pub async fn setup(config: &Config, request: SetupRequest) -> Result<(Self, BuildReport)> {
        let settings = SessionSettings::resolve(config, request);
        let (embedder, chat) = ollama_providers(config, &settings)?;
        Self::setup_with(settings, embedder, chat).await
    }

    /// Open the collection an earlier setup built, with Ollama providers
    #[inline]
    pub async fn open(config: &Config, request: SetupRequest) -> Result<Self> {
        let settings = SessionSettings::resolve(config, request);
        let (embedder, chat) = ollama_providers(config, &settings)?;
        Self::open_with(settings, embedder, chat).await
    }

    #[inline]
    pub async fn setup_with(
        settings: SessionSettings,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatProvider>,
    ) -> Result<(Self, BuildReport)> {
        let source_dir = settings
            .source_dir
            .as_deref()
            .ok_or_else(|| RagError::InvalidInput("No source directory provided".to_string()))?;
        let collection_name = settings.collection_name.as_deref().ok_or_else(|| {
            RagError::InvalidInput(format!(
                "Cannot derive a collection name from {}",
                source_dir.display()
            ))
        })?;

        let (index, report) =
            ChunkIndex::build(source_dir, collection_name, &settings.db_path, embedder).await?;

        info!(
            "Session ready: collection '{}', chat model {}",
            report.collection_name, settings.model_chat
        );
        Ok((Self::assemble(index, chat, settings), report))
    }

    #[inline]
    pub async fn open_with(
        settings: SessionSettings,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatProvider>,
    ) -> Result<Self> {
        let index = ChunkIndex::open(
            &settings.db_path,
            settings.collection_name.as_deref(),
            embedder,
        )
        .await?;

        info!(
            "Session reopened: collection '{}', chat model {}",
            index.collection_name(),
            settings.model_chat
        );
        Ok(Self::assemble(index, chat, settings))
    }

    fn assemble(index: ChunkIndex, chat: Arc<dyn ChatProvider>, settings: SessionSettings) -> Self {
        let assistant = Assistant::new(chat).with_max_retries(settings.max_retries);
        Self {
            index: RwLock::new(index),
            assistant,
            settings,
        }
    }

    #[inline]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    #[inline]
    pub async fn collection_name(&self) -> String {
        self.index.read().await.collection_name().to_string()
    }

    /// Answer a question from the campaign notes
    #[inline]
    pub async fn ask(&self, request: QueryRequest) -> Result<Answer> {
        let (query, top_k) = self.validate_query(request)?;
        let retrieval = self.retrieve(&query, top_k).await?;

        let assistant = self.assistant.clone();
        tokio::task::spawn_blocking(move || assistant.answer(&query, &retrieval.documents))
            .await
            .map_err(|e| RagError::Generation(format!("Generation task failed: {}", e)))?
    }

    /// Generate new campaign content of `kind`, grounded in the notes
    #[inline]
    pub async fn generate(
        &self,
        kind: ContentKind,
        request: QueryRequest,
    ) -> Result<GeneratedContent> {
        let (query, top_k) = self.validate_query(request)?;
        let query = crate::llm::generation_query(&query);
        let retrieval = self.retrieve(&query, top_k).await?;

        let assistant = self.assistant.clone();
        tokio::task::spawn_blocking(move || {
            assistant.generate(kind, &query, &retrieval.documents)
        })
        .await
        .map_err(|e| RagError::Generation(format!("Generation task failed: {}", e)))?
    }

    /// Nearest chunks for a query, without calling the chat model
    #[inline]
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Retrieval> {
        let retrieval = self.index.read().await.retrieve(query, top_k).await?;
        debug!(
            "Retrieved {} chunks: {:?}",
            retrieval.len(),
            retrieval.ids
        );
        Ok(retrieval)
    }

    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.index.read().await.count().await
    }

    #[inline]
    pub async fn inspect(&self, limit: Option<usize>) -> Result<Inspection> {
        self.index.read().await.inspect(limit).await
    }

    /// Rebuild the collection from the configured source directory
    #[inline]
    pub async fn rebuild(&self) -> Result<BuildReport> {
        let source_dir = self
            .settings
            .source_dir
            .as_deref()
            .ok_or_else(|| RagError::InvalidInput("No source directory provided".to_string()))?;

        let mut index = self.index.write().await;
        index.rebuild(source_dir).await
    }

    fn validate_query(&self, request: QueryRequest) -> Result<(String, usize)> {
        let query = request
            .query
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| RagError::InvalidInput("No query provided".to_string()))?;
        let top_k = request.top_k.unwrap_or(self.settings.top_k);
        if top_k == 0 {
            return Err(RagError::InvalidInput(
                "top_k must be at least 1".to_string(),
            ));
        }

        Ok((query, top_k))
    }
}

fn ollama_providers(
    config: &Config,
    settings: &SessionSettings,
) -> Result<(Arc<dyn Embedder>, Arc<dyn ChatProvider>)> {
    let embedder = OllamaClient::new(&config.ollama)?.with_model(settings.model_embed.clone());
    let chat = OllamaChatClient::new(&config.ollama)?.with_model(settings.model_chat.clone());

    Ok((Arc::new(embedder), Arc::new(chat)))
}
