//! Loading the comic corpus from a local tabular export.
//!
//! The source is either a JSON array of row objects or JSON Lines (`.jsonl`).
//! Row order is kept as-is: it becomes the only addressing scheme of the index.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One comic from the corpus. Missing fields are always `""`, never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub title: String,
    pub transcript: String,
    pub explanation: String,
}

impl ItemRecord {
    /// Text sent to the embedding model for this comic: title, transcript and
    /// explanation joined by single spaces. The id is not part of it.
    pub fn document(&self) -> String {
        format!("{} {} {}", self.title, self.transcript, self.explanation)
    }
}

/// A row as it appears in the source. `id` is a number in some exports.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default)]
    id: Option<RawId>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl From<RawRow> for ItemRecord {
    fn from(row: RawRow) -> Self {
        let id = match row.id {
            Some(RawId::Int(n)) => n.to_string(),
            Some(RawId::Text(s)) => s,
            None => String::new(),
        };
        Self {
            id,
            title: row.title.unwrap_or_default(),
            transcript: row.transcript.unwrap_or_default(),
            explanation: row.explanation.unwrap_or_default(),
        }
    }
}

/// Reads every row of the dataset at `path`, in source order.
/// Files ending in `.jsonl` are read line by line; anything else must be a JSON array.
pub fn load_corpus(path: &Path) -> Result<Vec<ItemRecord>, CorpusError> {
    if !path.is_file() {
        return Err(CorpusError::NotAFile(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path).map_err(|e| CorpusError::Read(path.to_path_buf(), e))?;
    let is_lines = path.extension().map_or(false, |e| e == "jsonl");
    if is_lines {
        parse_json_lines(&raw)
    } else {
        parse_json_array(&raw)
    }
}

fn parse_json_array(raw: &str) -> Result<Vec<ItemRecord>, CorpusError> {
    let rows: Vec<RawRow> = serde_json::from_str(raw).map_err(CorpusError::Schema)?;
    Ok(rows.into_iter().map(ItemRecord::from).collect())
}

fn parse_json_lines(raw: &str) -> Result<Vec<ItemRecord>, CorpusError> {
    let mut records = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row: RawRow =
            serde_json::from_str(line).map_err(|e| CorpusError::Line { line: i + 1, source: e })?;
        records.push(row.into());
    }
    Ok(records)
}

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("dataset is not a file: {0}")]
    NotAFile(PathBuf),
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("dataset does not match the expected row schema: {0}")]
    Schema(serde_json::Error),
    #[error("malformed row on line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
