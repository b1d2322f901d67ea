use async_trait::async_trait;
use futures_util::{future, stream, StreamExt};
use reqwest::Client;
use std::env;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::endpoints::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ResponseFormat,
};
use super::{strip_code_fences, GenerativeModel, ModelResponse, StructuredRequest, TextStream};
use crate::config::ModelSettings;

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },
    #[error("API returned empty content")]
    EmptyContent,
}

#[derive(Clone, Debug)]
pub enum Provider {
    OpenRouter {
        /// Environment variable holding the key; read on every call.
        api_key: String,
        model: String,
        base_url: String,
        site_url: String,
        app_name: String,
        temperature: Option<f32>,
        client: Client,
    },
}

/// Splits an SSE byte stream into `data:` payloads. Lines may straddle
/// network chunks, so incomplete tails are held back.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim_start();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
        payloads
    }
}

/// Content text carried by one streamed payload, if any.
pub(crate) fn delta_text(payload: &str) -> Option<Result<String, ApiConnectionError>> {
    if payload == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(ChatCompletionChunk {
            error: Some(error), ..
        }) => Some(Err(ApiConnectionError::ApiError {
            status: reqwest::StatusCode::BAD_GATEWAY,
            error_body: error.message,
        })),
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(Ok),
        Err(e) => {
            warn!(error = %e, "Failed to parse streaming chunk");
            None
        }
    }
}

impl Provider {
    pub fn openrouter(settings: &ModelSettings) -> Self {
        Self::OpenRouter {
            api_key: settings.api_key_env_var.clone(),
            model: settings.model.clone(),
            base_url: settings.api_base_url.clone(),
            site_url: settings.site_url.clone(),
            app_name: settings.app_name.clone(),
            temperature: settings.temperature,
            client: Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenRouter { model, .. } => model,
        }
    }

    async fn send(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<reqwest::Response, ApiConnectionError> {
        match self {
            Provider::OpenRouter {
                api_key: api_key_env_var_name,
                base_url,
                site_url,
                app_name,
                client,
                ..
            } => {
                let actual_api_key = env::var(api_key_env_var_name)
                    .map_err(|_| ApiConnectionError::MissingApiKey(api_key_env_var_name.clone()))?;

                let url = format!("{}/chat/completions", base_url);
                let response = client
                    .post(url)
                    .bearer_auth(actual_api_key)
                    .header("HTTP-Referer", site_url)
                    .header("X-Title", app_name)
                    .json(request)
                    .send()
                    .await?;

                if response.status().is_success() {
                    Ok(response)
                } else {
                    let status = response.status();
                    let error_body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to read error body".to_string());
                    Err(ApiConnectionError::ApiError { status, error_body })
                }
            }
        }
    }

    pub async fn call_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        let response = self.send(&request).await?;
        Ok(response.json::<ChatCompletionResponse>().await?)
    }

    /// Streams content deltas as raw UTF-8 chunks in arrival order. The
    /// stream ends when the server closes the connection.
    pub async fn call_chat_completion_stream(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<TextStream, ApiConnectionError> {
        request.stream = true;
        let response = self.send(&request).await?;

        let chunks = response
            .bytes_stream()
            .scan(SseDecoder::default(), |decoder, chunk| {
                let items: Vec<Result<Vec<u8>, ApiConnectionError>> = match chunk {
                    Ok(bytes) => decoder
                        .push(&bytes)
                        .iter()
                        .filter_map(|payload| delta_text(payload))
                        .map(|delta| delta.map(String::into_bytes))
                        .collect(),
                    Err(e) => vec![Err(ApiConnectionError::NetworkError(e))],
                };
                future::ready(Some(stream::iter(items)))
            })
            .flatten();

        Ok(Box::pin(chunks) as TextStream)
    }
}

#[async_trait]
impl GenerativeModel for Provider {
    #[instrument(skip(self, request), fields(model = %self.model(), schema = %request.schema.name, stream = request.stream))]
    async fn generate_structured(
        &self,
        request: StructuredRequest,
    ) -> Result<ModelResponse, ApiConnectionError> {
        let (wants_stream, chat_request) = match self {
            Provider::OpenRouter {
                model, temperature, ..
            } => (
                request.stream,
                ChatCompletionRequest {
                    model: model.clone(),
                    messages: request.messages,
                    response_format: Some(ResponseFormat::json_schema(request.schema)),
                    temperature: *temperature,
                    max_tokens: request.max_tokens,
                    stream: false,
                },
            ),
        };

        if wants_stream {
            debug!("Starting streaming structured request");
            return Ok(ModelResponse::Stream(
                self.call_chat_completion_stream(chat_request).await?,
            ));
        }

        let response = self.call_chat_completion(chat_request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ApiConnectionError::EmptyContent)?;
        let content = strip_code_fences(&content);
        if content.is_empty() {
            return Err(ApiConnectionError::EmptyContent);
        }
        debug!(bytes = content.len(), "Received structured response");
        Ok(ModelResponse::Complete(serde_json::from_str(content)?))
    }
}
