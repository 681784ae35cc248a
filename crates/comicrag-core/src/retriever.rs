//! Query → embedding → top-K comics.

use std::time::Instant;

use crate::corpus::ItemRecord;
use crate::embedding::{EmbedError, Embedder};
use crate::index::ComicIndex;
use crate::metrics::Instrumentation;
use crate::store::VectorIndexError;

pub const DEFAULT_TOP_K: usize = 5;

/// A retrieved comic and its squared Euclidean distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub record: ItemRecord,
    pub distance: f32,
}

/// Embeds `query` and returns up to `k` comics, closest first.
/// Only the search itself is reported to `sink`.
pub async fn retrieve<E: Embedder>(
    index: &ComicIndex,
    embedder: &E,
    query: &str,
    k: usize,
    sink: &dyn Instrumentation,
) -> Result<Vec<Candidate>, RetrieveError> {
    let query_vector = embedder.embed(query).await?;
    let started = Instant::now();
    let hits = index.vectors().search(&query_vector, k)?;
    sink.search_completed(started.elapsed());
    Ok(hits
        .into_iter()
        .map(|(position, distance)| Candidate {
            record: index.metadata().get(position).clone(),
            distance,
        })
        .collect())
}

#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("could not embed query: {0}")]
    Embed(#[from] EmbedError),
    #[error("search failed: {0}")]
    Search(#[from] VectorIndexError),
}
