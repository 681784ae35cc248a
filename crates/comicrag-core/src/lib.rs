//! All backend logic independent of how the finder is run (CLI or a chat UI).
//!
//! Build time: [corpus] → [embedding] → [store] + [metadata], persisted as a
//! pair by [index]. Query time: [retriever] → [context] → [generation] →
//! [selection], wired together by [finder].

pub mod app_data;
pub mod config;
pub mod context;
pub mod corpus;
pub mod embedding;
pub mod finder;
pub mod generation;
pub mod index;
pub mod lookup;
pub mod metadata;
pub mod metrics;
pub mod ollama;
pub mod retriever;
pub mod selection;
pub mod store;

#[cfg(test)]
mod testing;

pub use app_data::app_data_dir;
pub use config::{load_config, save_config, set_dataset_path, Config, ConfigError};
pub use context::{build_messages, build_prompt, render_candidates};
pub use corpus::{load_corpus, CorpusError, ItemRecord};
pub use embedding::{EmbedError, Embedder};
pub use finder::{Answer, ComicFinder, FinderSettings};
pub use generation::{ChatTurn, GenerationError, GenerationRequest, Generator, ModelResponse, Role};
pub use index::{build_index, ensure_index, rebuild, ComicIndex, IndexError, IndexPaths, PairPresence};
pub use lookup::{reference_url, LookupError, XkcdLookup};
pub use metadata::{MetadataError, MetadataStore};
pub use metrics::{millis, Counters, Instrumentation, LogSink, Tee};
pub use ollama::{OllamaClient, OllamaError};
pub use retriever::{retrieve, Candidate, RetrieveError};
pub use selection::{parse_selection, Selection};
pub use store::{Expectations, VectorIndex, VectorIndexError};

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "comicrag-core ready"
}
