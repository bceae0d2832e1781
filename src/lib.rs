use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Collection not initialized. Run setup first.")]
    NotInitialized,

    #[error("Chunking error: {0}")]
    Chunking(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Response did not match the {schema} schema after {attempts} attempt(s): {message}")]
    SchemaValidation {
        schema: String,
        attempts: u32,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Whether the caller is at fault (bad input or missing setup)
    #[inline]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::NotInitialized)
    }

    /// HTTP-style status for the error class
    #[inline]
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() { 400 } else { 500 }
    }
}

pub mod chunker;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod indexer;
pub mod llm;
pub mod ollama;
pub mod session;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        assert_eq!(RagError::NotInitialized.status_code(), 400);
        assert_eq!(
            RagError::InvalidInput("No query provided".to_string()).status_code(),
            400
        );
    }

    #[test]
    fn provider_failures_map_to_500() {
        let err = RagError::SchemaValidation {
            schema: "NPCList".to_string(),
            attempts: 5,
            message: "missing field `NPCs`".to_string(),
        };
        assert!(!err.is_client_error());
        assert_eq!(err.status_code(), 500);
        assert_eq!(RagError::Embedding("down".to_string()).status_code(), 500);
    }
}
