use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding backend unavailable: {0}")]
    EmbedderUnavailable(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod service;
pub mod store;

pub use chunking::{ChunkingConfig, chunk_text};
pub use config::Config;
pub use embeddings::{Embedder, ollama::OllamaClient};
pub use index::VectorIndex;
pub use service::{RetrievalService, ScoredChunk};
pub use store::{ChunkRecord, KnowledgeStore, StoreStats};
