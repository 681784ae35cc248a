//! Index pipeline: load corpus → embed → vector index + metadata → persist.
//!
//! The persisted pair is a cache keyed only on file presence. It is not
//! invalidated when the dataset changes; run `build --force` after updating it.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::corpus::{load_corpus, CorpusError, ItemRecord};
use crate::embedding::{embed_all, EmbedError, Embedder};
use crate::metadata::{MetadataError, MetadataStore};
use crate::metrics::Instrumentation;
use crate::store::{Expectations, VectorIndex, VectorIndexError};

pub const INDEX_FILENAME: &str = "comics.index";
pub const METADATA_FILENAME: &str = "comics.meta.json";
pub const DEFAULT_EMBED_BATCH: usize = 64;

/// Where the two halves of the persisted pair live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub vectors: PathBuf,
    pub metadata: PathBuf,
}

/// Which halves of the pair exist on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairPresence {
    Complete,
    Missing,
    /// Exactly one file exists. Treated as corruption: rebuild.
    Partial,
}

impl IndexPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            vectors: dir.join(INDEX_FILENAME),
            metadata: dir.join(METADATA_FILENAME),
        }
    }

    pub fn presence(&self) -> PairPresence {
        match (self.vectors.is_file(), self.metadata.is_file()) {
            (true, true) => PairPresence::Complete,
            (false, false) => PairPresence::Missing,
            _ => PairPresence::Partial,
        }
    }
}

/// A vector index and its metadata, aligned position for position.
/// Read-only once constructed; share it by reference across queries.
#[derive(Debug, Clone, PartialEq)]
pub struct ComicIndex {
    vectors: VectorIndex,
    metadata: MetadataStore,
}

impl ComicIndex {
    /// Pairs the two halves, rejecting a length mismatch.
    pub fn new(vectors: VectorIndex, metadata: MetadataStore) -> Result<Self, IndexError> {
        if vectors.len() != metadata.len() {
            return Err(IndexError::Misaligned {
                vectors: vectors.len(),
                records: metadata.len(),
            });
        }
        Ok(Self { vectors, metadata })
    }

    pub fn vectors(&self) -> &VectorIndex {
        &self.vectors
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Writes both files next to their targets, then renames both into place.
    /// Nothing is renamed unless both writes succeeded.
    pub fn save(&self, paths: &IndexPaths) -> Result<(), IndexError> {
        for p in [&paths.vectors, &paths.metadata] {
            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent).map_err(|e| IndexError::Io(parent.to_path_buf(), e))?;
            }
        }
        let tmp_vectors = tmp_path(&paths.vectors);
        let tmp_metadata = tmp_path(&paths.metadata);
        let written = self
            .vectors
            .save(&tmp_vectors)
            .map_err(IndexError::from)
            .and_then(|()| self.metadata.save(&tmp_metadata).map_err(IndexError::from));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp_vectors);
            let _ = std::fs::remove_file(&tmp_metadata);
            return Err(e);
        }
        // Metadata goes first: if the vectors rename then fails, the stale
        // vectors fail the length check on load instead of serving new records.
        if let Err(e) = std::fs::rename(&tmp_metadata, &paths.metadata) {
            let _ = std::fs::remove_file(&tmp_vectors);
            let _ = std::fs::remove_file(&tmp_metadata);
            return Err(IndexError::Io(paths.metadata.clone(), e));
        }
        if let Err(e) = std::fs::rename(&tmp_vectors, &paths.vectors) {
            tracing::warn!(
                vectors = %paths.vectors.display(),
                error = %e,
                "vector index rename failed after metadata was replaced; pair is split"
            );
            let _ = std::fs::remove_file(&tmp_vectors);
            return Err(IndexError::Io(paths.vectors.clone(), e));
        }
        Ok(())
    }

    /// Loads a complete pair. Any problem with either file is a load fault,
    /// including a pair that holds no vectors at all.
    pub fn load(paths: &IndexPaths, expect: Expectations<'_>) -> Result<Self, IndexError> {
        let vectors = VectorIndex::load(&paths.vectors, expect).map_err(IndexError::LoadVectors)?;
        if vectors.is_empty() {
            return Err(IndexError::LoadVectors(VectorIndexError::NotReady));
        }
        let metadata = MetadataStore::load(&paths.metadata).map_err(IndexError::LoadMetadata)?;
        Self::new(vectors, metadata)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Embeds every record and builds the in-memory pair. Does not touch disk.
pub async fn build_index<E: Embedder>(
    records: Vec<ItemRecord>,
    embedder: &E,
    batch_size: usize,
) -> Result<ComicIndex, IndexError> {
    if records.is_empty() {
        return Err(IndexError::EmptyCorpus);
    }
    let documents: Vec<String> = records.iter().map(ItemRecord::document).collect();
    let embeddings = embed_all(embedder, &documents, batch_size).await?;
    drop(documents);
    let vectors = VectorIndex::build(embedder.model_id(), embeddings)?;
    ComicIndex::new(vectors, MetadataStore::new(records))
}

/// Loads the corpus, builds the pair and persists it, replacing any existing files.
pub async fn rebuild<E: Embedder>(
    dataset: &Path,
    paths: &IndexPaths,
    embedder: &E,
    batch_size: usize,
    sink: &dyn Instrumentation,
) -> Result<ComicIndex, IndexError> {
    let started = Instant::now();
    let records = load_corpus(dataset)?;
    tracing::info!(items = records.len(), dataset = %dataset.display(), "building index");
    let index = build_index(records, embedder, batch_size).await?;
    index.save(paths)?;
    sink.build_completed(started.elapsed(), index.len());
    Ok(index)
}

/// Loads the persisted pair when both files exist, otherwise builds it.
/// A present but unreadable pair is an error, never a silent rebuild.
pub async fn ensure_index<E: Embedder>(
    dataset: &Path,
    paths: &IndexPaths,
    embedder: &E,
    batch_size: usize,
    sink: &dyn Instrumentation,
) -> Result<ComicIndex, IndexError> {
    match paths.presence() {
        PairPresence::Complete => {
            tracing::info!(path = %paths.vectors.display(), "loading cached index");
            let expect = Expectations {
                dimension: None,
                model: Some(embedder.model_id()),
            };
            ComicIndex::load(paths, expect)
        }
        PairPresence::Missing => rebuild(dataset, paths, embedder, batch_size, sink).await,
        PairPresence::Partial => {
            tracing::warn!(
                vectors = %paths.vectors.display(),
                metadata = %paths.metadata.display(),
                "only one half of the index pair exists; rebuilding"
            );
            rebuild(dataset, paths, embedder, batch_size, sink).await
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),
    #[error("corpus is empty; nothing to index")]
    EmptyCorpus,
    #[error("embedding error: {0}")]
    Embed(#[from] EmbedError),
    #[error("vector index error: {0}")]
    Vectors(#[from] VectorIndexError),
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
    #[error("index has {vectors} vectors but {records} records")]
    Misaligned { vectors: usize, records: usize },
    #[error("cached vector index is unusable (delete it or rebuild): {0}")]
    LoadVectors(VectorIndexError),
    #[error("cached metadata is unusable (delete it or rebuild): {0}")]
    LoadMetadata(MetadataError),
    #[error("I/O error for {0}: {1}")]
    Io(PathBuf, std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Counters;
    use crate::testing::{fixture_corpus, KeywordEmbedder};

    fn write_dataset(dir: &Path) -> PathBuf {
        let path = dir.join("xkcd.json");
        let rows: Vec<_> = fixture_corpus()
            .into_iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id, "title": r.title,
                    "transcript": r.transcript, "explanation": r.explanation,
                })
            })
            .collect();
        std::fs::write(&path, serde_json::to_vec(&rows).unwrap()).unwrap();
        path
    }

    fn expecting(model: &str) -> Expectations<'_> {
        Expectations {
            dimension: None,
            model: Some(model),
        }
    }

    /// A well-formed index file header declaring `count` vectors and no body.
    fn header_only(model: &str, dimension: u32, count: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&crate::store::INDEX_MAGIC);
        bytes.extend_from_slice(&crate::store::INDEX_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(model.len() as u16).to_le_bytes());
        bytes.extend_from_slice(model.as_bytes());
        bytes.extend_from_slice(&dimension.to_le_bytes());
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes
    }

    #[tokio::test]
    async fn build_keeps_vectors_and_records_aligned() {
        let idx = build_index(fixture_corpus(), &KeywordEmbedder::new(), 2).await.unwrap();
        assert_eq!(idx.vectors().len(), idx.metadata().len());
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.vectors().model(), KeywordEmbedder::MODEL);
    }

    #[tokio::test]
    async fn empty_corpus_fails() {
        let err = build_index(Vec::new(), &KeywordEmbedder::new(), 8).await.unwrap_err();
        assert!(matches!(err, IndexError::EmptyCorpus));
    }

    #[test]
    fn misaligned_pair_is_rejected() {
        let vectors = VectorIndex::build("m", vec![vec![1.0], vec![2.0]]).unwrap();
        let metadata = MetadataStore::new(vec![ItemRecord::default()]);
        assert!(matches!(
            ComicIndex::new(vectors, metadata),
            Err(IndexError::Misaligned { vectors: 2, records: 1 })
        ));
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::in_dir(dir.path());
        let idx = build_index(fixture_corpus(), &KeywordEmbedder::new(), 8).await.unwrap();
        idx.save(&paths).unwrap();
        assert_eq!(paths.presence(), PairPresence::Complete);
        assert!(!tmp_path(&paths.vectors).exists());
        let loaded = ComicIndex::load(&paths, expecting(KeywordEmbedder::MODEL)).unwrap();
        assert_eq!(loaded, idx);
    }

    #[tokio::test]
    async fn ensure_builds_on_miss_then_loads() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_dataset(dir.path());
        let paths = IndexPaths::in_dir(&dir.path().join("cache"));
        let sink = Counters::default();
        let e = KeywordEmbedder::new();

        assert_eq!(paths.presence(), PairPresence::Missing);
        let built = ensure_index(&dataset, &paths, &e, 8, &sink).await.unwrap();
        assert_eq!(paths.presence(), PairPresence::Complete);

        // Removing the dataset proves the second call is served from the cache.
        std::fs::remove_file(&dataset).unwrap();
        let loaded = ensure_index(&dataset, &paths, &e, 8, &sink).await.unwrap();
        assert_eq!(loaded, built);
    }

    #[tokio::test]
    async fn partial_pair_triggers_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_dataset(dir.path());
        let paths = IndexPaths::in_dir(dir.path());
        std::fs::write(&paths.metadata, b"[]").unwrap();
        assert_eq!(paths.presence(), PairPresence::Partial);
        let idx = ensure_index(&dataset, &paths, &KeywordEmbedder::new(), 8, &Counters::default())
            .await
            .unwrap();
        assert_eq!(idx.len(), 3);
        assert_eq!(MetadataStore::load(&paths.metadata).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn corrupt_pair_is_a_load_fault() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_dataset(dir.path());
        let paths = IndexPaths::in_dir(dir.path());
        std::fs::write(&paths.vectors, b"garbage").unwrap();
        std::fs::write(&paths.metadata, b"[]").unwrap();
        let err = ensure_index(&dataset, &paths, &KeywordEmbedder::new(), 8, &Counters::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::LoadVectors(_)));
    }

    #[tokio::test]
    async fn model_change_is_a_load_fault() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::in_dir(dir.path());
        build_index(fixture_corpus(), &KeywordEmbedder::new(), 8)
            .await
            .unwrap()
            .save(&paths)
            .unwrap();
        let err = ComicIndex::load(&paths, expecting("another-model")).unwrap_err();
        assert!(matches!(
            err,
            IndexError::LoadVectors(VectorIndexError::ModelMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn rebuild_twice_keeps_rankings() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_dataset(dir.path());
        let paths = IndexPaths::in_dir(dir.path());
        let sink = Counters::default();
        let e = KeywordEmbedder::new();
        let first = rebuild(&dataset, &paths, &e, 8, &sink).await.unwrap();
        let second = rebuild(&dataset, &paths, &e, 1, &sink).await.unwrap();
        let q = e.embed("debugging code").await.unwrap();
        let rank = |idx: &ComicIndex| -> Vec<usize> {
            idx.vectors().search(&q, 3).unwrap().into_iter().map(|h| h.0).collect()
        };
        assert_eq!(rank(&first), rank(&second));
        assert_eq!(ComicIndex::load(&paths, Expectations::default()).unwrap(), second);
    }

    #[tokio::test]
    async fn empty_cached_pair_is_a_load_fault() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_dataset(dir.path());
        let paths = IndexPaths::in_dir(dir.path());
        std::fs::write(&paths.vectors, header_only(KeywordEmbedder::MODEL, 8, 0)).unwrap();
        std::fs::write(&paths.metadata, b"[]").unwrap();
        let err = ensure_index(&dataset, &paths, &KeywordEmbedder::new(), 8, &Counters::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::LoadVectors(VectorIndexError::NotReady)));
    }

    #[tokio::test]
    async fn build_duration_is_reported_only_when_building() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_dataset(dir.path());
        let paths = IndexPaths::in_dir(dir.path());
        let sink = Counters::default();
        let e = KeywordEmbedder::new();

        ensure_index(&dataset, &paths, &e, 8, &sink).await.unwrap();
        assert_eq!(sink.builds(), 1);
        let first_build = sink.last_build();

        ensure_index(&dataset, &paths, &e, 8, &sink).await.unwrap();
        assert_eq!(sink.builds(), 1);
        assert_eq!(sink.last_build(), first_build);

        rebuild(&dataset, &paths, &e, 8, &sink).await.unwrap();
        assert_eq!(sink.builds(), 2);
    }

    #[tokio::test]
    async fn failed_vector_rename_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::in_dir(dir.path());
        // A non-empty directory where the vector file should go makes its rename fail.
        std::fs::create_dir(&paths.vectors).unwrap();
        std::fs::write(paths.vectors.join("occupied"), b"x").unwrap();
        let idx = build_index(fixture_corpus(), &KeywordEmbedder::new(), 8).await.unwrap();

        let err = idx.save(&paths).unwrap_err();
        assert!(matches!(err, IndexError::Io(ref p, _) if *p == paths.vectors));
        assert!(!tmp_path(&paths.vectors).exists());
        assert!(!tmp_path(&paths.metadata).exists());
        // The metadata landed first, so the split pair cannot load as valid.
        assert_eq!(MetadataStore::load(&paths.metadata).unwrap().len(), 3);
        assert_eq!(paths.presence(), PairPresence::Partial);
    }
}
