//! Generative model service: a tagged single-shot / streamed response so
//! the same ingestion code serves both transports.

pub mod connection;
pub mod endpoints;

use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

use connection::ApiConnectionError;
use endpoints::{ChatMessage, JsonSchemaDefinition};

/// Opaque UTF-8 text chunks in arrival order; end of stream is the only
/// completion signal.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ApiConnectionError>> + Send>>;

pub enum ModelResponse {
    Complete(serde_json::Value),
    Stream(TextStream),
}

impl std::fmt::Debug for ModelResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelResponse::Complete(value) => f.debug_tuple("Complete").field(value).finish(),
            ModelResponse::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub messages: Vec<ChatMessage>,
    pub schema: JsonSchemaDefinition,
    pub max_tokens: Option<u32>,
    /// Ask for incremental delivery instead of one complete object.
    pub stream: bool,
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate_structured(
        &self,
        request: StructuredRequest,
    ) -> Result<ModelResponse, ApiConnectionError>;
}

/// Unwraps a response that is entirely one markdown code block. Anything
/// else is returned trimmed but otherwise untouched.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if !(trimmed.starts_with("```") && trimmed.ends_with("```")) || trimmed.len() < 6 {
        return trimmed;
    }
    let inner = &trimmed[3..trimmed.len() - 3];
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}
