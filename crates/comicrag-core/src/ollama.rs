//! Ollama client for embeddings and chat. Wraps ollama-rs with a simple API.

use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::models::ModelOptions;
use ollama_rs::Ollama;
use thiserror::Error;

use crate::embedding::{EmbedError, Embedder};
use crate::generation::{GenerationError, GenerationRequest, Generator, ModelResponse, Role};

/// Ollama's packaging of all-MiniLM-L6-v2.
pub const DEFAULT_EMBED_MODEL: &str = "all-minilm";
pub const DEFAULT_CHAT_MODEL: &str = "llama3:8b";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Thin wrapper around Ollama for embedding and chat completion.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    inner: Ollama,
    embed_model: String,
    chat_model: String,
}

impl Default for OllamaClient {
    /// Localhost:11434 with the default models.
    fn default() -> Self {
        Self {
            inner: Ollama::default(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
        }
    }
}

impl OllamaClient {
    /// Create from URL string, e.g. `http://localhost:11434`.
    pub fn from_url(url: &str) -> Result<Self, OllamaError> {
        let inner = Ollama::try_new(url).map_err(OllamaError::ParseUrl)?;
        Ok(Self {
            inner,
            ..Self::default()
        })
    }

    /// Set the embedding model (e.g. `all-minilm`, `nomic-embed-text`).
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    /// Set the chat model used to pick a comic.
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    async fn request_embeddings(&self, input: EmbeddingsInput) -> Result<Vec<Vec<f32>>, OllamaError> {
        let req = GenerateEmbeddingsRequest::new(self.embed_model.clone(), input);
        let res = self
            .inner
            .generate_embeddings(req)
            .await
            .map_err(OllamaError::Request)?;
        Ok(res.embeddings)
    }
}

impl Embedder for OllamaClient {
    fn model_id(&self) -> &str {
        &self.embed_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let embeddings = self
            .request_embeddings(EmbeddingsInput::Single(text.to_string()))
            .await?;
        embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(EmbedError::EmptyVector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .request_embeddings(EmbeddingsInput::Multiple(texts.to_vec()))
            .await?)
    }
}

impl Generator for OllamaClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<ModelResponse, GenerationError> {
        let messages = request
            .messages
            .iter()
            .map(|turn| match turn.role {
                Role::System => ChatMessage::system(turn.content.clone()),
                Role::User => ChatMessage::user(turn.content.clone()),
            })
            .collect();
        let options = ModelOptions::default()
            .temperature(request.temperature)
            .num_predict(i32::try_from(request.max_tokens).unwrap_or(i32::MAX));
        let req = ChatMessageRequest::new(self.chat_model.clone(), messages).options(options);
        let res = self
            .inner
            .send_chat_messages(req)
            .await
            .map_err(OllamaError::Request)?;
        Ok(ModelResponse::Chat {
            content: Some(res.message.content),
        })
    }
}

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("invalid Ollama URL: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("Ollama request failed: {0}")]
    Request(#[from] ollama_rs::error::OllamaError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_models() {
        let c = OllamaClient::from_url(DEFAULT_BASE_URL)
            .unwrap()
            .with_embed_model("nomic-embed-text")
            .with_chat_model("mistral");
        assert_eq!(c.model_id(), "nomic-embed-text");
        assert_eq!(c.chat_model(), "mistral");
    }

    #[test]
    fn rejects_bad_url() {
        assert!(matches!(
            OllamaClient::from_url("not a url"),
            Err(OllamaError::ParseUrl(_))
        ));
    }
}
