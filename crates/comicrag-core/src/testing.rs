//! Deterministic stand-ins for the model boundaries, used by unit tests.

use std::sync::Mutex;

use crate::corpus::ItemRecord;
use crate::embedding::{EmbedError, Embedder};
use crate::generation::{GenerationError, GenerationRequest, Generator, ModelResponse};
use crate::ollama::OllamaError;

const VOCABULARY: &[&str] = &[
    "procrastination",
    "later",
    "code",
    "debugging",
    "programmers",
    "barrel",
    "ocean",
    "sleep",
];

/// Bag-of-words over a fixed vocabulary, normalized to unit length.
pub(crate) struct KeywordEmbedder;

impl KeywordEmbedder {
    pub(crate) const MODEL: &'static str = "keyword-test";

    pub(crate) fn new() -> Self {
        Self
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; VOCABULARY.len()];
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            let word = word.to_lowercase();
            if let Some(i) = VOCABULARY.iter().position(|w| *w == word) {
                v[i] += 1.0;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl Embedder for KeywordEmbedder {
    fn model_id(&self) -> &str {
        Self::MODEL
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(Self::vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }
}

/// Replies with a canned response, or fails when none is set.
pub(crate) struct ScriptedGenerator {
    reply: Option<ModelResponse>,
    pub(crate) last_request: Mutex<Option<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub(crate) fn replying(reply: ModelResponse) -> Self {
        Self {
            reply: Some(reply),
            last_request: Mutex::new(None),
        }
    }

    pub(crate) fn chat(text: &str) -> Self {
        Self::replying(ModelResponse::Chat {
            content: Some(text.to_string()),
        })
    }

    pub(crate) fn failing() -> Self {
        Self {
            reply: None,
            last_request: Mutex::new(None),
        }
    }
}

impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<ModelResponse, GenerationError> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.reply
            .clone()
            .ok_or(GenerationError::Backend(OllamaError::ParseUrl(url::ParseError::EmptyHost)))
    }
}

/// Three comics; "100" is the only one about procrastination.
pub(crate) fn fixture_corpus() -> Vec<ItemRecord> {
    vec![
        ItemRecord {
            id: "1".into(),
            title: "Barrel - Part 1".into(),
            transcript: "A boy sits in a barrel which is floating in an ocean.".into(),
            explanation: "The boy drifts on the ocean in a barrel and wonders where he will float next.".into(),
        },
        ItemRecord {
            id: "100".into(),
            title: "Family Circus".into(),
            transcript: "I'll do it later. Later. Maybe tomorrow.".into(),
            explanation: "A comic about procrastination: putting the task off until later, then later again.".into(),
        },
        ItemRecord {
            id: "844".into(),
            title: "Good Code".into(),
            transcript: "A flowchart on how to write good code. Start debugging. Code it right, or code it fast.".into(),
            explanation: "Programmers debugging code end up rewriting code forever.".into(),
        },
    ]
}
