// Retrieval service module
// Facade over chunker, embedder, and knowledge store: ingest documents,
// answer similarity queries, compose retrieval-augmented context


use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::chunking::{ChunkingConfig, chunk_text};
use crate::embeddings::Embedder;
use crate::store::{ChunkRecord, KnowledgeStore, StoreStats};
use crate::{RagError, Result};

/// A retrieved chunk together with its cosine similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub record: ChunkRecord,
    pub score: f32,
}

/// Facade over the retrieval engine.
///
/// Holds the store behind a single-writer lock: `ingest` and `clear` take
/// the write lock for the full mutate-then-persist span, `retrieve` and
/// `stats` only a read lock. Collaborators are injected; there is no
/// process-wide instance.
pub struct RetrievalService {
    store: RwLock<KnowledgeStore>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
}

impl RetrievalService {
    #[inline]
    pub fn new(
        store: KnowledgeStore,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
    ) -> Result<Self> {
        chunking.validate()?;
        Ok(Self {
            store: RwLock::new(store),
            embedder,
            chunking,
        })
    }

    /// Ingest one document: chunk, embed in one batch, append to the store,
    /// and persist.
    ///
    /// Returns `Ok(false)` without mutating anything when the content is
    /// empty, the embedder is unavailable, or chunking produces nothing.
    /// Returns `Ok(true)` only after the store has been durably saved.
    #[inline]
    pub fn ingest(&self, file_name: &str, content: &str, doc_type: &str) -> Result<bool> {
        if content.trim().is_empty() {
            debug!("Skipping ingest of '{}': empty content", file_name);
            return Ok(false);
        }
        if !self.embedder.is_available() {
            warn!(
                "Skipping ingest of '{}': embedding backend unavailable",
                file_name
            );
            return Ok(false);
        }

        let chunks = chunk_text(content, &self.chunking)?;
        if chunks.is_empty() {
            debug!("Skipping ingest of '{}': no chunks produced", file_name);
            return Ok(false);
        }

        // Embed outside the store lock; only the append-and-save span needs
        // mutual exclusion.
        let vectors = match self.embedder.embed_batch(&chunks) {
            Ok(vectors) => vectors,
            Err(RagError::EmbedderUnavailable(reason)) => {
                warn!("Embedding failed for '{}': {}", file_name, reason);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let mut store = self.write_store()?;

        let document_seq = store.allocate_document_seq();
        let timestamp = Utc::now();
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| ChunkRecord {
                id: format!("{}_{}", document_seq, i),
                file_name: file_name.to_string(),
                doc_type: doc_type.to_string(),
                chunk_index: i as u32,
                content: chunk,
                timestamp,
            })
            .collect();
        let chunk_count = records.len();

        store.append(records, &vectors)?;
        store.save()?;

        info!("Ingested '{}' with {} chunks", file_name, chunk_count);
        Ok(true)
    }

    /// Retrieve the `top_k` most similar chunks for a query.
    ///
    /// Soft failure: an unavailable embedder or an empty store yields an
    /// empty result, signalling "no context available" rather than an error.
    #[inline]
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        if !self.embedder.is_available() {
            warn!("Retrieval skipped: embedding backend unavailable");
            return Ok(Vec::new());
        }

        let query_vector = match self.embedder.embed(query) {
            Ok(vector) => vector,
            Err(RagError::EmbedderUnavailable(reason)) => {
                warn!("Query embedding failed: {}", reason);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let store = self.read_store()?;
        if store.is_empty() {
            return Ok(Vec::new());
        }

        let hits = store.index().search(&query_vector, top_k)?;
        let results = hits
            .into_iter()
            .filter_map(|(position, score)| {
                store.records().get(position).map(|record| ScoredChunk {
                    record: record.clone(),
                    score,
                })
            })
            .collect::<Vec<_>>();

        debug!("Retrieved {} chunks for query", results.len());
        Ok(results)
    }

    /// Format retrieved chunks into a single context block for the external
    /// generation step. Pure, order-preserving join.
    #[inline]
    pub fn compose_context(results: &[ScoredChunk]) -> String {
        results
            .iter()
            .map(|r| format!("From {}: {}", r.record.file_name, r.record.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Build the retrieval-augmented prompt body for a query, or `None`
    /// when no context was retrieved and the caller should fall back to an
    /// unaugmented response.
    #[inline]
    pub fn compose_prompt(query: &str, results: &[ScoredChunk]) -> Option<String> {
        if results.is_empty() {
            return None;
        }

        let context = Self::compose_context(results);
        Some(format!(
            "Based on the following context from our knowledge base, please answer \
             the question. If the context doesn't contain relevant information, \
             provide a general answer.\n\nCONTEXT:\n{}\n\nQUESTION: {}\n\nANSWER:",
            context, query
        ))
    }

    #[inline]
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(self.read_store()?.stats())
    }

    /// Clear the entire store, including persisted artifacts.
    #[inline]
    pub fn clear(&self) -> Result<()> {
        self.write_store()?.clear()
    }

    fn read_store(&self) -> Result<std::sync::RwLockReadGuard<'_, KnowledgeStore>> {
        self.store
            .read()
            .map_err(|_| RagError::Other(anyhow::anyhow!("Knowledge store lock poisoned")))
    }

    fn write_store(&self) -> Result<std::sync::RwLockWriteGuard<'_, KnowledgeStore>> {
        self.store
            .write()
            .map_err(|_| RagError::Other(anyhow::anyhow!("Knowledge store lock poisoned")))
    }
}
