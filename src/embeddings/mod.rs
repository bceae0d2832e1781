// Embeddings module
// Provider-neutral embedding interface and the Ollama implementation

pub mod ollama;

pub use ollama::OllamaClient;

use crate::Result;

/// Turns text into fixed-length vectors.
///
/// Every vector produced by one embedder must have the same dimension.
pub trait Embedder: Send + Sync {
    /// Name of the model producing the vectors
    fn model(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, one vector per text in input order
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Preferred number of texts per `embed_batch` call
    #[inline]
    fn batch_size(&self) -> usize {
        1
    }
}
