// Embeddings module
// Capability-checked interface over the embedding backend

pub mod ollama;

pub use ollama::OllamaClient;

use crate::Result;

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be deterministic for identical input and report a
/// stable `dimension()` for their lifetime. Backend failures surface as
/// [`crate::RagError::EmbedderUnavailable`]; callers treat that as a
/// capability gap and degrade rather than crash.
pub trait Embedder: Send + Sync {
    /// Whether the backend is currently able to serve embedding requests.
    fn is_available(&self) -> bool;

    /// The fixed output dimension of this embedder.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_owned()];
        let mut vectors = self.embed_batch(&texts)?;
        vectors.pop().ok_or_else(|| {
            crate::RagError::EmbedderUnavailable(
                "Backend returned no embedding for input".to_string(),
            )
        })
    }
}
