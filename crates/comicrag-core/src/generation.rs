//! The generative model boundary: role-tagged messages in, free text out.

use std::future::Future;

use crate::ollama::OllamaError;

pub const DEFAULT_MAX_TOKENS: u32 = 200;
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

/// One message sent to the chat model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub messages: Vec<ChatTurn>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// The shapes a model reply can come back in.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    /// Chat-style reply with a message body.
    Chat { content: Option<String> },
    /// Completion-style reply with plain text.
    Completion { text: Option<String> },
    /// Anything else. Holds a short description for logs only.
    Unrecognized(String),
}

impl ModelResponse {
    /// The reply text, trimmed. Missing content in any shape is `""`.
    pub fn into_text(self) -> String {
        let text = match self {
            Self::Chat { content: Some(c) } => c,
            Self::Completion { text: Some(t) } => t,
            Self::Chat { content: None } | Self::Completion { text: None } => String::new(),
            Self::Unrecognized(shape) => {
                tracing::warn!(%shape, "unrecognized model response shape");
                String::new()
            }
        };
        text.trim().to_string()
    }
}

/// A chat model. Calls block until the model answers; timeouts and retries
/// belong to whoever wraps the implementation.
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<ModelResponse, GenerationError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation backend failed: {0}")]
    Backend(#[from] OllamaError),
}
