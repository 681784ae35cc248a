//! The embedding boundary: text in, fixed-dimension vector out.

use std::future::Future;

use crate::ollama::OllamaError;

/// Maps text to dense vectors. One instance is loaded per process and shared
/// by the build and query paths, so both sides live in the same vector space.
pub trait Embedder: Send + Sync {
    /// Identifier of the model behind this embedder. Persisted with the index.
    fn model_id(&self) -> &str;

    /// Embed a single string.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, EmbedError>> + Send;

    /// Embed many strings; returns exactly one vector per input, in order.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, EmbedError>> + Send;
}

/// Embeds `texts` in slices of `batch_size`, checking that every call returned
/// one non-empty vector per input.
pub async fn embed_all<E: Embedder>(
    embedder: &E,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let batch_size = batch_size.max(1);
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size) {
        let vectors = embedder.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(EmbedError::CountMismatch {
                expected: batch.len(),
                actual: vectors.len(),
            });
        }
        if vectors.iter().any(Vec::is_empty) {
            return Err(EmbedError::EmptyVector);
        }
        out.extend(vectors);
    }
    Ok(out)
}

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding backend failed: {0}")]
    Backend(#[from] OllamaError),
    #[error("embedding model returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
    #[error("embedding model returned an empty vector")]
    EmptyVector,
}
