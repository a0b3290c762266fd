// Vector index module
// Exact top-k cosine similarity over L2-normalized rows, with a flat
// binary persistence layout

#[cfg(test)]
mod tests;

use std::io::{Read, Write};

use tracing::debug;

use crate::{RagError, Result};

const INDEX_MAGIC: [u8; 4] = *b"RGIX";
const INDEX_FORMAT_VERSION: u32 = 1;

/// Append-only collection of fixed-dimension vectors supporting exact
/// brute-force similarity search.
///
/// Rows are L2-normalized on insert, so the inner product against a
/// normalized query is cosine similarity. Row order is insertion order and
/// is never changed; callers rely on row position to join back to chunk
/// metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    // Flattened row-major storage: rows.len() == len() * dimension
    rows: Vec<f32>,
}

impl VectorIndex {
    /// Create an empty index. Dimensionality is fixed for the lifetime of
    /// the index.
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Config(
                "Vector dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            rows: Vec::new(),
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len() / self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append vectors in the given order, normalizing each row.
    ///
    /// Fails without mutating the index if any vector has the wrong
    /// dimension.
    #[inline]
    pub fn add_batch(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(RagError::Config(format!(
                    "Vector dimension mismatch: expected {}, got {}",
                    self.dimension,
                    vector.len()
                )));
            }
        }

        self.rows.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            let mut row = vector.clone();
            normalize_l2(&mut row);
            self.rows.extend_from_slice(&row);
        }

        debug!("Added {} vectors, index now holds {}", vectors.len(), self.len());
        Ok(())
    }

    /// Exact top-k search: inner product of the normalized query against
    /// every row, sorted by score descending. Ties keep insertion order.
    /// Returns `(row position, score)` pairs, at most `min(k, len)` of them.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(RagError::Config(format!(
                "Query dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            )));
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut normalized = query.to_vec();
        normalize_l2(&mut normalized);

        let mut scored: Vec<(usize, f32)> = self
            .rows
            .chunks_exact(self.dimension)
            .map(|row| dot(row, &normalized))
            .enumerate()
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k.min(self.len()));

        Ok(scored)
    }

    /// Serialize the index: magic, format version, dimension, row count,
    /// then rows as little-endian f32.
    #[inline]
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&INDEX_MAGIC)?;
        writer.write_all(&INDEX_FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&u32::try_from(self.dimension).map_err(to_persistence_err)?.to_le_bytes())?;
        writer.write_all(&u32::try_from(self.len()).map_err(to_persistence_err)?.to_le_bytes())?;

        for value in &self.rows {
            writer.write_all(&value.to_le_bytes())?;
        }

        Ok(())
    }

    /// Deserialize an index written by [`VectorIndex::write_to`].
    ///
    /// Any structural inconsistency (bad magic, unknown version, truncated
    /// rows) is reported as [`RagError::Persistence`]; callers treat that
    /// as a corrupted artifact and fall back to an empty store.
    #[inline]
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| RagError::Persistence(format!("Failed to read index header: {}", e)))?;
        if magic != INDEX_MAGIC {
            return Err(RagError::Persistence(
                "Index file has wrong magic bytes".to_string(),
            ));
        }

        let version = read_u32(reader)?;
        if version != INDEX_FORMAT_VERSION {
            return Err(RagError::Persistence(format!(
                "Unsupported index format version: {}",
                version
            )));
        }

        let dimension = read_u32(reader)? as usize;
        let count = read_u32(reader)? as usize;
        if dimension == 0 {
            return Err(RagError::Persistence(
                "Index file declares zero dimension".to_string(),
            ));
        }

        // The header counts are untrusted; grow from the data actually
        // read instead of sizing an allocation from them.
        let total = count.checked_mul(dimension).ok_or_else(|| {
            RagError::Persistence("Index file declares an impossible row count".to_string())
        })?;

        let mut rows = Vec::new();
        let mut buf = [0u8; 4];
        for _ in 0..total {
            reader
                .read_exact(&mut buf)
                .map_err(|e| RagError::Persistence(format!("Truncated index rows: {}", e)))?;
            rows.push(f32::from_le_bytes(buf));
        }

        // Trailing bytes mean the artifact was not written by us.
        let mut trailing = [0u8; 1];
        match reader.read(&mut trailing) {
            Ok(0) => {}
            Ok(_) => {
                return Err(RagError::Persistence(
                    "Index file has trailing data".to_string(),
                ));
            }
            Err(e) => return Err(RagError::Persistence(format!("Failed to read index: {}", e))),
        }

        debug!("Loaded index with {} vectors of dimension {}", count, dimension);
        Ok(Self { dimension, rows })
    }
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|e| RagError::Persistence(format!("Truncated index header: {}", e)))?;
    Ok(u32::from_le_bytes(buf))
}

fn to_persistence_err<E: std::fmt::Display>(e: E) -> RagError {
    RagError::Persistence(e.to_string())
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left as-is so
/// they score 0 against every query instead of dividing by zero.
fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
