// Chunking module
// Splits raw document text into bounded, overlapping passages for embedding


use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

/// Configuration for text chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Chunk size in words
    pub chunk_size: usize,
    /// Overlap in words shared between consecutive chunks; must be
    /// strictly less than `chunk_size`
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap: 50,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config(
                "Chunk size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "Chunk overlap ({}) must be less than chunk size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Split text into overlapping word windows of at most `chunk_size` words,
/// advancing by `chunk_size - overlap` words per window.
///
/// Empty or whitespace-only input yields an empty vector. Each returned
/// chunk is re-joined with single spaces and is never empty.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    config.validate()?;

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Ok(Vec::new());
    }

    let step = config.chunk_size - config.overlap;
    let mut chunks = Vec::new();

    let mut start = 0;
    while start < words.len() {
        let end = (start + config.chunk_size).min(words.len());
        let chunk = words[start..end].join(" ");
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        start += step;
    }

    debug!(
        "Chunked {} words into {} chunks (size {}, overlap {})",
        words.len(),
        chunks.len(),
        config.chunk_size,
        config.overlap
    );

    Ok(chunks)
}
