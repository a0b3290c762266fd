// Knowledge store module
// Owns the parallel pair of chunk metadata and vector index, and their
// durable persistence


use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::index::VectorIndex;
use crate::{RagError, Result};

const RECENT_FILES_WINDOW: usize = 10;
const RECENT_FILES_LIMIT: usize = 5;

/// One embedded passage and its metadata.
///
/// The record at position `i` of the store corresponds exactly to row `i`
/// of the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Unique within the store, minted as `{document_seq}_{chunk_index}`
    pub id: String,
    /// Logical source name (path, URL, or user label); not unique
    pub file_name: String,
    /// Caller-provided tag such as `pdf`, `docx`, `txt`; opaque here
    pub doc_type: String,
    /// Position of this passage within its source document, from 0
    pub chunk_index: u32,
    /// The chunk text that was embedded; never empty
    pub content: String,
    /// Creation time, set once
    pub timestamp: DateTime<Utc>,
}

/// Aggregate statistics over the store contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Count of distinct `file_name` values
    pub total_documents: usize,
    /// Count of chunk records
    pub total_chunks: usize,
    /// Chunk counts per `doc_type`
    pub doc_type_counts: HashMap<String, usize>,
    /// Up to five distinct source names from the most recent records,
    /// most recent first
    pub recent_file_names: Vec<String>,
}

/// Persistent pairing of chunk metadata and embedding vectors.
///
/// Grows only through [`KnowledgeStore::append`]; shrinks only through
/// [`KnowledgeStore::clear`]. The metadata sequence and the index are kept
/// positionally aligned at all times.
pub struct KnowledgeStore {
    records: Vec<ChunkRecord>,
    index: VectorIndex,
    next_document_seq: u64,
    documents_path: PathBuf,
    index_path: PathBuf,
}

impl KnowledgeStore {
    /// Open a store backed by the two given artifact paths.
    ///
    /// Missing artifacts produce an empty store (first run). Unreadable or
    /// mutually inconsistent artifacts also produce an empty store, logged
    /// at warn level; a corrupted pair must never serve misaligned results.
    #[inline]
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        documents_path: P,
        index_path: Q,
        dimension: usize,
    ) -> Result<Self> {
        let documents_path = documents_path.as_ref().to_path_buf();
        let index_path = index_path.as_ref().to_path_buf();

        let mut store = Self {
            records: Vec::new(),
            index: VectorIndex::new(dimension)?,
            next_document_seq: 0,
            documents_path,
            index_path,
        };

        match store.load_artifacts(dimension) {
            Ok(Some((records, index))) => {
                store.next_document_seq = next_seq_after(&records);
                info!(
                    "Loaded knowledge store with {} chunks from {}",
                    records.len(),
                    store.documents_path.display()
                );
                store.records = records;
                store.index = index;
            }
            Ok(None) => {
                debug!(
                    "No persisted knowledge store at {}, starting empty",
                    store.documents_path.display()
                );
            }
            Err(e) => {
                warn!("Persisted knowledge store is unusable, starting empty: {}", e);
            }
        }

        Ok(store)
    }

    /// Load both artifacts, or `None` when neither half has been written yet.
    fn load_artifacts(
        &self,
        dimension: usize,
    ) -> Result<Option<(Vec<ChunkRecord>, VectorIndex)>> {
        if !self.documents_path.exists() && !self.index_path.exists() {
            return Ok(None);
        }
        if !self.documents_path.exists() || !self.index_path.exists() {
            return Err(RagError::Persistence(
                "One of the two store artifacts is missing".to_string(),
            ));
        }

        let documents_file = File::open(&self.documents_path)
            .map_err(|e| RagError::Persistence(format!("Failed to open documents file: {}", e)))?;
        let records: Vec<ChunkRecord> = serde_json::from_reader(BufReader::new(documents_file))
            .map_err(|e| RagError::Persistence(format!("Failed to parse documents file: {}", e)))?;

        let index_file = File::open(&self.index_path)
            .map_err(|e| RagError::Persistence(format!("Failed to open index file: {}", e)))?;
        let index = VectorIndex::read_from(&mut BufReader::new(index_file))?;

        if index.len() != records.len() {
            return Err(RagError::Persistence(format!(
                "Artifact mismatch: {} records but {} vectors",
                records.len(),
                index.len()
            )));
        }
        if index.dimension() != dimension {
            return Err(RagError::Persistence(format!(
                "Persisted index dimension {} does not match configured {}",
                index.dimension(),
                dimension
            )));
        }

        Ok(Some((records, index)))
    }

    /// Append records and their vectors in lockstep.
    ///
    /// The two slices must have equal lengths; records must carry non-empty
    /// content and vectors the index dimension. Nothing is mutated unless
    /// every check passes.
    #[inline]
    pub fn append(&mut self, records: Vec<ChunkRecord>, vectors: &[Vec<f32>]) -> Result<()> {
        debug_assert_eq!(
            records.len(),
            vectors.len(),
            "records and vectors must be appended in lockstep"
        );
        if records.len() != vectors.len() {
            return Err(RagError::Other(anyhow::anyhow!(
                "Internal invariant violation: {} records with {} vectors",
                records.len(),
                vectors.len()
            )));
        }

        for record in &records {
            if record.content.trim().is_empty() {
                return Err(RagError::Config(format!(
                    "Chunk record {} has empty content",
                    record.id
                )));
            }
        }

        // add_batch validates dimensions before touching its rows, so a
        // failure here leaves both sides untouched.
        self.index.add_batch(vectors)?;
        self.records.extend(records);

        debug_assert_eq!(self.records.len(), self.index.len());
        Ok(())
    }

    /// Persist both artifacts durably.
    ///
    /// Each file is written to a temporary sibling and renamed into place,
    /// so a crash mid-save leaves the previous committed pair intact.
    #[inline]
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self
            .documents_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory: {}", parent.display()))
                .map_err(RagError::Other)?;
        }

        // Stage both artifacts fully (written and synced) before renaming
        // either, so a failure anywhere during serialization leaves the
        // previously committed pair untouched. The remaining non-atomic
        // window is just the two renames.
        let documents_tmp = stage_write(&self.documents_path, |writer| {
            serde_json::to_writer(writer, &self.records)
                .map_err(|e| RagError::Persistence(format!("Failed to write documents: {}", e)))
        })?;
        let index_tmp = stage_write(&self.index_path, |writer| self.index.write_to(writer))?;

        commit_staged(&documents_tmp, &self.documents_path)?;
        commit_staged(&index_tmp, &self.index_path)?;

        debug!(
            "Saved knowledge store ({} chunks) to {}",
            self.records.len(),
            self.documents_path.display()
        );
        Ok(())
    }

    /// Reset to an empty store of the same dimensionality and delete the
    /// persisted artifacts.
    #[inline]
    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        self.index = VectorIndex::new(self.index.dimension())?;
        self.next_document_seq = 0;

        for path in [&self.documents_path, &self.index_path] {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(RagError::Persistence(format!(
                        "Failed to remove {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        info!("Knowledge store cleared");
        Ok(())
    }

    /// Hand out the next document sequence number used to mint chunk ids.
    #[inline]
    pub fn allocate_document_seq(&mut self) -> u64 {
        let seq = self.next_document_seq;
        self.next_document_seq += 1;
        seq
    }

    #[inline]
    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn stats(&self) -> StoreStats {
        let total_documents = self
            .records
            .iter()
            .map(|r| r.file_name.as_str())
            .unique()
            .count();

        let mut doc_type_counts: HashMap<String, usize> = HashMap::new();
        for record in &self.records {
            *doc_type_counts.entry(record.doc_type.clone()).or_default() += 1;
        }

        let recent_file_names = self
            .records
            .iter()
            .rev()
            .take(RECENT_FILES_WINDOW)
            .map(|r| r.file_name.clone())
            .unique()
            .take(RECENT_FILES_LIMIT)
            .collect();

        StoreStats {
            total_documents,
            total_chunks: self.records.len(),
            doc_type_counts,
            recent_file_names,
        }
    }
}

/// First unused document sequence: one past the highest sequence component
/// found in persisted ids. Re-ingested sources therefore never reuse an id.
fn next_seq_after(records: &[ChunkRecord]) -> u64 {
    records
        .iter()
        .filter_map(|r| r.id.split('_').next())
        .filter_map(|seq| seq.parse::<u64>().ok())
        .max()
        .map_or(0, |max| max + 1)
}

/// Write to a temporary sibling of `path` and sync it, returning the
/// temporary path for a later [`commit_staged`] rename.
fn stage_write<F>(path: &Path, write: F) -> Result<PathBuf>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let tmp_path = path.with_extension("tmp");
    let file = File::create(&tmp_path)
        .map_err(|e| RagError::Persistence(format!("Failed to create {}: {}", tmp_path.display(), e)))?;

    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer
        .into_inner()
        .map_err(|e| RagError::Persistence(format!("Failed to flush {}: {}", tmp_path.display(), e)))?
        .sync_all()
        .map_err(|e| RagError::Persistence(format!("Failed to sync {}: {}", tmp_path.display(), e)))?;

    Ok(tmp_path)
}

fn commit_staged(tmp_path: &Path, path: &Path) -> Result<()> {
    fs::rename(tmp_path, path).map_err(|e| {
        RagError::Persistence(format!(
            "Failed to move {} into place: {}",
            tmp_path.display(),
            e
        ))
    })
}
