//! Exact nearest-neighbour vector index with a binary on-disk format.
//!
//! Vectors are kept row-major in one flat buffer. Position `i` is the only
//! identity a vector has; the metadata store resolves it to a comic.
//!
//! File layout (little-endian):
//!
//! ```text
//! magic      "CRVI"           4 bytes
//! version    u16
//! model_len  u16
//! model      utf-8            model_len bytes
//! dimension  u32
//! count      u32
//! vectors    f32              count * dimension
//! ```

use std::fs;
use std::path::{Path, PathBuf};

pub const INDEX_MAGIC: [u8; 4] = *b"CRVI";
pub const INDEX_VERSION: u16 = 1;

/// What a loaded index must agree with. `None` accepts anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Expectations<'a> {
    pub dimension: Option<usize>,
    pub model: Option<&'a str>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct VectorIndex {
    model: String,
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Builds an index from one vector per corpus row, in corpus order.
    /// The dimension is taken from the first vector; every other must match.
    pub fn build(model: impl Into<String>, vectors: Vec<Vec<f32>>) -> Result<Self, VectorIndexError> {
        let dimension = vectors.first().map(Vec::len).ok_or(VectorIndexError::Empty)?;
        if dimension == 0 {
            return Err(VectorIndexError::ZeroDimension);
        }
        let mut data = Vec::with_capacity(dimension * vectors.len());
        for (position, v) in vectors.into_iter().enumerate() {
            if v.len() != dimension {
                return Err(VectorIndexError::DimensionMismatch {
                    position,
                    expected: dimension,
                    actual: v.len(),
                });
            }
            data.extend(v);
        }
        Ok(Self {
            model: model.into(),
            dimension,
            data,
        })
    }

    /// The `k` nearest stored vectors by squared Euclidean distance, closest
    /// first. Equal distances keep insertion order. `k` is clamped to `len()`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, VectorIndexError> {
        if self.is_empty() {
            return Err(VectorIndexError::NotReady);
        }
        if query.len() != self.dimension {
            return Err(VectorIndexError::QueryDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .map(|v| squared_l2(query, v))
            .enumerate()
            .collect();
        // Stable sort, so ties stay in position order.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k.min(scored.len()));
        Ok(scored)
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embedding model the vectors were produced with.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, VectorIndexError> {
        let model_len =
            u16::try_from(self.model.len()).map_err(|_| VectorIndexError::Format("model id too long".into()))?;
        let dimension =
            u32::try_from(self.dimension).map_err(|_| VectorIndexError::Format("dimension too large".into()))?;
        let count = u32::try_from(self.len()).map_err(|_| VectorIndexError::Format("too many vectors".into()))?;

        let mut out = Vec::with_capacity(16 + self.model.len() + self.data.len() * 4);
        out.extend_from_slice(&INDEX_MAGIC);
        out.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        out.extend_from_slice(&model_len.to_le_bytes());
        out.extend_from_slice(self.model.as_bytes());
        out.extend_from_slice(&dimension.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        for x in &self.data {
            out.extend_from_slice(&x.to_le_bytes());
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8], expect: Expectations<'_>) -> Result<Self, VectorIndexError> {
        let mut r = Reader { bytes, pos: 0 };
        if r.take(4)? != INDEX_MAGIC {
            return Err(VectorIndexError::Format("bad magic".into()));
        }
        let version = r.u16()?;
        if version != INDEX_VERSION {
            return Err(VectorIndexError::Format(format!("unsupported version {version}")));
        }
        let model_len = r.u16()? as usize;
        let model = std::str::from_utf8(r.take(model_len)?)
            .map_err(|_| VectorIndexError::Format("model id is not utf-8".into()))?
            .to_string();
        let dimension = r.u32()? as usize;
        let count = r.u32()? as usize;
        if dimension == 0 {
            return Err(VectorIndexError::ZeroDimension);
        }
        if let Some(expected) = expect.dimension {
            if expected != dimension {
                return Err(VectorIndexError::FileDimension { expected, found: dimension });
            }
        }
        if let Some(expected) = expect.model {
            if expected != model {
                return Err(VectorIndexError::ModelMismatch {
                    expected: expected.to_string(),
                    found: model,
                });
            }
        }
        let body_len = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| VectorIndexError::Format("declared size overflows".into()))?;
        let body = r.take(body_len)?;
        if r.pos != bytes.len() {
            return Err(VectorIndexError::Format(format!(
                "{} trailing bytes after vectors",
                bytes.len() - r.pos
            )));
        }
        let data = body
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(Self { model, dimension, data })
    }

    pub fn save(&self, path: &Path) -> Result<(), VectorIndexError> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|e| VectorIndexError::Io(path.to_path_buf(), e))
    }

    pub fn load(path: &Path, expect: Expectations<'_>) -> Result<Self, VectorIndexError> {
        let bytes = fs::read(path).map_err(|e| VectorIndexError::Io(path.to_path_buf(), e))?;
        Self::from_bytes(&bytes, expect)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], VectorIndexError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(VectorIndexError::Truncated)?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, VectorIndexError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, VectorIndexError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[derive(Debug, thiserror::Error)]
pub enum VectorIndexError {
    #[error("cannot build an index from zero vectors")]
    Empty,
    #[error("embedding vectors must have at least one dimension")]
    ZeroDimension,
    #[error("vector {position} has dimension {actual}, expected {expected}")]
    DimensionMismatch { position: usize, expected: usize, actual: usize },
    #[error("index not ready: no vectors loaded")]
    NotReady,
    #[error("query has dimension {actual}, index has {expected}")]
    QueryDimension { expected: usize, actual: usize },
    #[error("index file has dimension {found}, expected {expected}")]
    FileDimension { expected: usize, found: usize },
    #[error("index was built with model {found:?}, expected {expected:?}")]
    ModelMismatch { expected: String, found: String },
    #[error("index file is truncated")]
    Truncated,
    #[error("invalid index file: {0}")]
    Format(String),
    #[error("index I/O error for {0}: {1}")]
    Io(PathBuf, std::io::Error),
}
