// LanceDB vector database module
// Row types shared by the chunker, the indexer and the collection store


pub mod vector_store;

use serde::{Deserialize, Serialize};

use crate::chunker::HeaderPath;

/// Metadata kept next to every stored chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Enclosing headers, serialized as `Header 1` .. `Header 4`
    #[serde(flatten)]
    pub headers: HeaderPath,
    /// Absolute path of the markdown file the chunk came from
    pub source: String,
    pub source_basename: String,
    pub chunk_id: String,
}

/// A chunk together with its embedding, ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub vector: Vec<f32>,
    /// The formatted chunk text that was embedded
    pub document: String,
    pub metadata: ChunkMetadata,
}

/// A chunk read back from storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
}

/// Nearest-neighbour match with its L2 distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: StoredChunk,
    pub distance: f32,
}
