//! Comic records positionally aligned with the vector index.

use std::fs;
use std::path::{Path, PathBuf};

use crate::corpus::ItemRecord;

/// Record `i` belongs to vector `i` of the paired [`crate::store::VectorIndex`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MetadataStore {
    records: Vec<ItemRecord>,
}

impl MetadataStore {
    pub fn new(records: Vec<ItemRecord>) -> Self {
        Self { records }
    }

    /// The record at `position`.
    ///
    /// # Panics
    /// If `position` is out of range. Positions only ever come from the paired
    /// vector index, so that would mean the pair is misaligned.
    pub fn get(&self, position: usize) -> &ItemRecord {
        assert!(
            position < self.records.len(),
            "metadata position {position} out of range for {} records",
            self.records.len()
        );
        &self.records[position]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<(), MetadataError> {
        let s = serde_json::to_vec(&self.records).map_err(MetadataError::Serialize)?;
        fs::write(path, s).map_err(|e| MetadataError::Io(path.to_path_buf(), e))
    }

    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let bytes = fs::read(path).map_err(|e| MetadataError::Io(path.to_path_buf(), e))?;
        let records = serde_json::from_slice(&bytes).map_err(MetadataError::Deserialize)?;
        Ok(Self { records })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("failed to serialize metadata: {0}")]
    Serialize(serde_json::Error),
    #[error("corrupt metadata file: {0}")]
    Deserialize(serde_json::Error),
    #[error("metadata I/O error for {0}: {1}")]
    Io(PathBuf, std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ItemRecord> {
        vec![
            ItemRecord {
                id: "1".into(),
                title: "Barrel - Part 1".into(),
                ..Default::default()
            },
            ItemRecord {
                id: "2".into(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn round_trip_keeps_order_and_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        let store = MetadataStore::new(records());
        store.save(&path).unwrap();
        let loaded = MetadataStore::load(&path).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.get(1).title, "");
        assert_eq!(loaded.get(0).id, "1");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn get_out_of_range_panics() {
        MetadataStore::new(records()).get(2);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(MetadataStore::load(&path), Err(MetadataError::Deserialize(_))));
    }
}
