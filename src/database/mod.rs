// Database module
// Persistent vector collections backed by LanceDB

pub mod lancedb;

pub use lancedb::{ChunkMetadata, ChunkRecord, SearchHit, StoredChunk};
pub use lancedb::vector_store::CollectionStore;
