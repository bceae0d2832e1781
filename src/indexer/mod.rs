// Indexer module
// Builds a vector collection from a directory of campaign notes and answers
// nearest-neighbour queries against it


use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chunker::{self, DirectoryChunks};
use crate::database::{ChunkMetadata, ChunkRecord, CollectionStore, StoredChunk};
use crate::embeddings::Embedder;
use crate::{RagError, Result};

/// Summary of a finished build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub collection_name: String,
    pub documents: usize,
    pub chunks: usize,
    /// Whether the storage path held data that the build wiped
    pub replaced_existing: bool,
}

/// Nearest chunks for a query, as parallel sequences ordered by distance
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Retrieval {
    pub documents: Vec<String>,
    pub ids: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
}

impl Retrieval {
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Diagnostic view of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub total_documents: usize,
    pub documents: Vec<StoredChunk>,
    pub sample_shown: usize,
}

/// Remove whatever is stored at `path`. Returns whether anything existed.
#[inline]
pub fn clear_storage(path: &Path) -> Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Nothing to clear at {}", path.display());
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }

    info!("Cleared existing storage at {}", path.display());
    Ok(true)
}

/// A collection of embedded chunks plus the embedder that produced them
pub struct ChunkIndex {
    store: CollectionStore,
    embedder: Arc<dyn Embedder>,
    storage_path: PathBuf,
}

impl ChunkIndex {
    /// Chunk and embed `source_dir`, then replace everything at
    /// `storage_path` with the new collection.
    ///
    /// Chunking and embedding finish before storage is touched, so a failure
    /// in either leaves the previous collection in place.
    #[inline]
    pub async fn build(
        source_dir: &Path,
        collection_name: &str,
        storage_path: &Path,
        embedder: Arc<dyn Embedder>,
    ) -> Result<(Self, BuildReport)> {
        let collection_name = collection_name_for(collection_name)?;
        info!(
            "Building collection '{}' from {} into {}",
            collection_name,
            source_dir.display(),
            storage_path.display()
        );

        let DirectoryChunks { documents, chunks } = chunker::split_directory(source_dir)?;

        let texts: Vec<String> = chunks.iter().map(|c| c.formatted_text.clone()).collect();
        let vectors = run_embedder(Arc::clone(&embedder), texts).await?;

        let replaced_existing = clear_storage(storage_path)?;
        if replaced_existing {
            warn!(
                "Replacing existing collection data at {}",
                storage_path.display()
            );
        }

        let mut store = CollectionStore::connect(storage_path, &collection_name).await?;
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| ChunkRecord {
                id: chunk.id,
                vector,
                document: chunk.formatted_text,
                metadata: chunk.metadata,
            })
            .collect();
        store.store_batch(&records).await?;

        let stored = store.count().await?;
        if stored != records.len() {
            return Err(RagError::Database(format!(
                "Collection '{}' holds {} chunks after inserting {}",
                collection_name,
                stored,
                records.len()
            )));
        }

        let report = BuildReport {
            collection_name,
            documents,
            chunks: records.len(),
            replaced_existing,
        };
        info!(
            "Built collection '{}' with {} chunks from {} documents",
            report.collection_name, report.chunks, report.documents
        );

        let index = Self {
            store,
            embedder,
            storage_path: storage_path.to_path_buf(),
        };
        Ok((index, report))
    }

    /// Build again from `source_dir` into the same collection and storage
    #[inline]
    pub async fn rebuild(&mut self, source_dir: &Path) -> Result<BuildReport> {
        let (index, report) = Self::build(
            source_dir,
            self.store.name(),
            &self.storage_path,
            Arc::clone(&self.embedder),
        )
        .await?;

        *self = index;
        Ok(report)
    }

    /// Open a previously built collection without rebuilding it.
    ///
    /// Without a name, the storage path must hold exactly one collection.
    #[inline]
    pub async fn open(
        storage_path: &Path,
        collection_name: Option<&str>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        if !storage_path.is_dir() {
            return Err(RagError::NotInitialized);
        }

        let name = match collection_name {
            Some(name) => collection_name_for(name)?,
            None => {
                let mut names = CollectionStore::collection_names(storage_path).await?;
                match names.len() {
                    0 => return Err(RagError::NotInitialized),
                    1 => names.remove(0),
                    _ => {
                        return Err(RagError::InvalidInput(format!(
                            "Storage at {} holds several collections ({}); name one",
                            storage_path.display(),
                            names.join(", ")
                        )));
                    }
                }
            }
        };

        let store = CollectionStore::connect(storage_path, &name).await?;
        info!(
            "Opened collection '{}' at {}",
            store.name(),
            storage_path.display()
        );

        Ok(Self {
            store,
            embedder,
            storage_path: storage_path.to_path_buf(),
        })
    }

    #[inline]
    pub fn collection_name(&self) -> &str {
        self.store.name()
    }

    #[inline]
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    #[inline]
    pub fn embedding_model(&self) -> &str {
        self.embedder.model()
    }

    /// The `k` chunks nearest to `query`, closest first
    #[inline]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Retrieval> {
        if k == 0 {
            return Err(RagError::InvalidInput(
                "top_k must be at least 1".to_string(),
            ));
        }

        if self.store.count().await? == 0 {
            debug!(
                "Collection '{}' is empty, nothing to retrieve",
                self.store.name()
            );
            return Ok(Retrieval::default());
        }

        let mut vectors = run_embedder(Arc::clone(&self.embedder), vec![query.to_string()]).await?;
        let query_vector = vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("No embedding returned for query".to_string()))?;

        let hits = self.store.search(&query_vector, k).await?;
        debug!("Retrieved {} chunks for query", hits.len());

        let mut retrieval = Retrieval::default();
        for hit in hits {
            retrieval.ids.push(hit.chunk.id);
            retrieval.documents.push(hit.chunk.document);
            retrieval.metadatas.push(hit.chunk.metadata);
            retrieval.distances.push(hit.distance);
        }
        Ok(retrieval)
    }

    /// Look up a single chunk by id
    #[inline]
    pub async fn get(&self, id: &str) -> Result<Option<StoredChunk>> {
        self.store.get(id).await
    }

    /// Total size plus up to `limit` stored chunks (all when `None`)
    #[inline]
    pub async fn inspect(&self, limit: Option<usize>) -> Result<Inspection> {
        let total_documents = self.store.count().await?;
        let documents = self.store.list(limit).await?;

        Ok(Inspection {
            total_documents,
            sample_shown: documents.len(),
            documents,
        })
    }

    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.store.count().await
    }
}

fn collection_name_for(name: &str) -> Result<String> {
    let normalized = chunker::normalize(name.trim());
    let valid_chars = normalized
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if normalized.is_empty() || normalized == "-" || !valid_chars {
        return Err(RagError::InvalidInput(format!(
            "Invalid collection name: '{}' (only letters, digits, '_', '-' and '.' are allowed)",
            name
        )));
    }
    Ok(normalized)
}

/// Embed texts off the async runtime, batched by the embedder's batch size
async fn run_embedder(embedder: Arc<dyn Embedder>, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    tokio::task::spawn_blocking(move || embed_all(embedder.as_ref(), &texts))
        .await
        .map_err(|e| RagError::Embedding(format!("Embedding task failed: {}", e)))?
}

fn embed_all(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let batch_size = embedder.batch_size().max(1);
    let mut vectors = Vec::with_capacity(texts.len());

    for (batch_number, batch) in texts.chunks(batch_size).enumerate() {
        let embedded = embedder.embed_batch(batch)?;
        if embedded.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "Embedder returned {} vectors for {} texts",
                embedded.len(),
                batch.len()
            )));
        }
        vectors.extend(embedded);
        debug!(
            "Embedded batch {} ({}/{} texts)",
            batch_number + 1,
            vectors.len(),
            texts.len()
        );
    }

    Ok(vectors)
}
