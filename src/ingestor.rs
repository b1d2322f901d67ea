//! Turns a generated `{"recipes": [...]}` payload into typed recipes.
//!
//! Streamed text is only ever parsed once the stream is exhausted. There is
//! no reliable object boundary mid-stream, so partial parsing is never
//! attempted: a truncated payload is rejected whole.

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api_connection::connection::ApiConnectionError;
use crate::api_connection::{strip_code_fences, ModelResponse};
use crate::recipe::Recipe;

pub const LOCAL_ID_PREFIX: &str = "local-";

#[derive(Debug, Error)]
pub enum IngestionFailure {
    /// The payload was not one well-formed `{"recipes": [...]}` document.
    #[error("malformed generation payload ({bytes} bytes received): {reason}")]
    Malformed { reason: String, bytes: usize },
    /// The stream itself failed before completing.
    #[error("generation stream interrupted: {0}")]
    Transport(#[source] ApiConnectionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Receiving,
    Complete,
    Parsed,
    Malformed,
}

#[derive(Debug, Deserialize)]
struct GeneratedBatch {
    recipes: Vec<Recipe>,
}

/// One ingestion: buffers decoded text in arrival order, then parses.
#[derive(Debug)]
pub struct StreamIngestor {
    session_stamp: i64,
    state: IngestState,
    buffer: String,
    // Bytes of a UTF-8 sequence split across chunks.
    pending: Vec<u8>,
    received: usize,
}

impl Default for StreamIngestor {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamIngestor {
    pub fn new() -> Self {
        Self::with_session_stamp(Utc::now().timestamp_millis())
    }

    /// Local ids take the form `local-{stamp}-{index}`.
    pub fn with_session_stamp(session_stamp: i64) -> Self {
        Self {
            session_stamp,
            state: IngestState::Receiving,
            buffer: String::new(),
            pending: Vec::new(),
            received: 0,
        }
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    fn malformed(&mut self, reason: impl Into<String>) -> IngestionFailure {
        self.state = IngestState::Malformed;
        let failure = IngestionFailure::Malformed {
            reason: reason.into(),
            bytes: self.received,
        };
        warn!(error = %failure, "rejecting generation payload");
        failure
    }

    // Misuse after the outcome is decided; the terminal state is kept.
    fn already_finished(&self, reason: &str) -> IngestionFailure {
        debug!(state = ?self.state, reason, "ingestor already finished");
        IngestionFailure::Malformed {
            reason: reason.to_string(),
            bytes: self.received,
        }
    }

    /// Appends one chunk. Multi-byte characters may span chunk boundaries.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<(), IngestionFailure> {
        if self.state != IngestState::Receiving {
            return Err(self.already_finished("chunk received after stream completed"));
        }
        self.received += chunk.len();
        self.pending.extend_from_slice(chunk);

        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                self.buffer.push_str(text);
                self.pending.clear();
            }
            Err(e) if e.error_len().is_none() => {
                // Incomplete sequence at the tail; keep it for the next chunk.
                let valid = e.valid_up_to();
                let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.buffer.push_str(&text);
                self.pending.drain(..valid);
            }
            Err(e) => return Err(self.malformed(format!("invalid UTF-8: {e}"))),
        }
        Ok(())
    }

    /// Marks the stream exhausted and parses everything received.
    pub fn finish(&mut self) -> Result<Vec<Recipe>, IngestionFailure> {
        if self.state != IngestState::Receiving {
            return Err(self.already_finished("ingestion already finished"));
        }
        self.state = IngestState::Complete;
        if !self.pending.is_empty() {
            return Err(self.malformed("stream ended inside a UTF-8 sequence"));
        }
        debug!(bytes = self.received, "generation stream complete");

        let text = std::mem::take(&mut self.buffer);
        match serde_json::from_str::<GeneratedBatch>(strip_code_fences(&text)) {
            Ok(batch) => Ok(self.accept(batch)),
            Err(e) => Err(self.malformed(e.to_string())),
        }
    }

    /// Consumes `stream` to the end, in order, then parses.
    pub async fn ingest<S, B>(mut self, mut stream: S) -> Result<Vec<Recipe>, IngestionFailure>
    where
        S: Stream<Item = Result<B, ApiConnectionError>> + Unpin,
        B: AsRef<[u8]>,
    {
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => self.push_chunk(bytes.as_ref())?,
                Err(e) => {
                    self.state = IngestState::Malformed;
                    warn!(error = %e, "generation stream failed");
                    return Err(IngestionFailure::Transport(e));
                }
            }
        }
        self.finish()
    }

    /// Same result for either transport mode.
    pub async fn ingest_response(
        mut self,
        response: ModelResponse,
    ) -> Result<Vec<Recipe>, IngestionFailure> {
        match response {
            ModelResponse::Stream(stream) => self.ingest(stream).await,
            ModelResponse::Complete(value) => {
                self.state = IngestState::Complete;
                match serde_json::from_value::<GeneratedBatch>(value) {
                    Ok(batch) => Ok(self.accept(batch)),
                    Err(e) => Err(self.malformed(e.to_string())),
                }
            }
        }
    }

    fn accept(&mut self, batch: GeneratedBatch) -> Vec<Recipe> {
        self.state = IngestState::Parsed;
        let recipes: Vec<Recipe> = batch
            .recipes
            .into_iter()
            .enumerate()
            .map(|(index, mut recipe)| {
                recipe.id = format!("{}{}-{}", LOCAL_ID_PREFIX, self.session_stamp, index);
                recipe.is_ai_generated = true;
                recipe.image_url.clear();
                recipe.author_id = None;
                recipe.created_at = None;
                recipe
            })
            .collect();
        info!(count = recipes.len(), "parsed generated recipes");
        recipes
    }
}

/// Recipes from one generation, addressable by their local ids until the
/// session is dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationSession {
    recipes: Vec<Recipe>,
}

impl GenerationSession {
    pub fn new(recipes: Vec<Recipe>) -> Self {
        Self { recipes }
    }

    pub fn is_local_id(id: &str) -> bool {
        id.starts_with(LOCAL_ID_PREFIX)
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    /// Swaps a local recipe for its persisted copy. Returns false if the
    /// local id is not in this session.
    pub fn replace(&mut self, local_id: &str, saved: Recipe) -> bool {
        match self.recipes.iter_mut().find(|r| r.id == local_id) {
            Some(slot) => {
                *slot = saved;
                true
            }
            None => false,
        }
    }

    pub fn into_recipes(self) -> Vec<Recipe> {
        self.recipes
    }
}
