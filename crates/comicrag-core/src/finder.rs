//! The per-query pipeline: retrieve, prompt, generate, parse.

use std::time::Instant;

use crate::context::build_messages;
use crate::embedding::Embedder;
use crate::generation::{GenerationRequest, Generator, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::index::ComicIndex;
use crate::lookup::reference_url;
use crate::metrics::Instrumentation;
use crate::retriever::{retrieve, Candidate, RetrieveError, DEFAULT_TOP_K};
use crate::selection::{parse_selection, Selection};

pub const SEARCH_FAILED_MESSAGE: &str = "Sorry, something went wrong while searching for a comic.";
pub const UNPARSEABLE_MESSAGE: &str = "Sorry, I couldn't parse the model response.";

#[derive(Debug, Clone, Copy)]
pub struct FinderSettings {
    pub top_k: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for FinderSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// What a query produced. `text` is always safe to show to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub selection: Selection,
    pub candidates: Vec<Candidate>,
    /// Comic page for a parsed selection.
    pub reference_url: Option<String>,
    /// False when retrieval or generation failed.
    pub succeeded: bool,
}

/// Holds the loaded index and model clients. Nothing here changes after
/// construction, so one finder can serve concurrent queries by reference.
#[derive(Debug)]
pub struct ComicFinder<E, G, S> {
    index: ComicIndex,
    embedder: E,
    generator: G,
    sink: S,
    settings: FinderSettings,
}

impl<E: Embedder, G: Generator, S: Instrumentation> ComicFinder<E, G, S> {
    pub fn new(index: ComicIndex, embedder: E, generator: G, sink: S, settings: FinderSettings) -> Self {
        Self {
            index,
            embedder,
            generator,
            sink,
            settings,
        }
    }

    pub fn index(&self) -> &ComicIndex {
        &self.index
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Candidates for `query` without calling the chat model.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Candidate>, RetrieveError> {
        retrieve(&self.index, &self.embedder, query, k, &self.sink).await
    }

    /// Runs the whole pipeline. Never fails: faults become a fallback message.
    pub async fn answer(&self, query: &str) -> Answer {
        let candidates = match self.search(query, self.settings.top_k).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "retrieval failed");
                self.sink.request_finished(false);
                return Answer {
                    text: SEARCH_FAILED_MESSAGE.to_string(),
                    selection: Selection::Unparsed(String::new()),
                    candidates: Vec::new(),
                    reference_url: None,
                    succeeded: false,
                };
            }
        };

        let request = GenerationRequest {
            messages: build_messages(query, &candidates),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        let started = Instant::now();
        let generated = self.generator.generate(&request).await;
        self.sink.generation_completed(started.elapsed());

        let (reply, succeeded) = match generated {
            Ok(response) => (response.into_text(), true),
            Err(e) => {
                tracing::warn!(error = %e, "generation failed");
                (String::new(), false)
            }
        };

        let selection = parse_selection(&reply);
        let page = selection.id().map(|id| {
            self.sink.comic_selected(id);
            reference_url(id)
        });
        self.sink.request_finished(succeeded);

        let text = if reply.is_empty() {
            UNPARSEABLE_MESSAGE.to_string()
        } else {
            reply
        };
        Answer {
            text,
            selection,
            candidates,
            reference_url: page,
            succeeded,
        }
    }
}
