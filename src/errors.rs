use thiserror::Error;

use crate::api_connection::connection::ApiConnectionError;
use crate::store::StoreError;

/// Input rejected before any processing happens.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(u8),
    #[error("at least one ingredient is required")]
    EmptyIngredients,
    #[error("servings must be at least 1, got {0}")]
    ServingsOutOfRange(u32),
    #[error("nutrition values must be finite and non-negative")]
    NegativeNutrition,
    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
    #[error("an image is required")]
    EmptyImage,
}

/// Error taxonomy for every engine operation that touches a collaborator.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("document store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("generative model unavailable: {0}")]
    ModelUnavailable(#[source] ApiConnectionError),
    #[error("malformed upstream payload: {0}")]
    MalformedPayload(String),
}

impl RecipeError {
    /// Whether the caller may retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RecipeError::StoreUnavailable(_) | RecipeError::ModelUnavailable(_))
    }
}

impl From<StoreError> for RecipeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => RecipeError::StoreUnavailable(reason),
            StoreError::Malformed { collection, id, reason } => {
                RecipeError::MalformedPayload(format!("{collection}/{id}: {reason}"))
            }
        }
    }
}

impl From<ApiConnectionError> for RecipeError {
    fn from(err: ApiConnectionError) -> Self {
        match err {
            ApiConnectionError::SerializationError(e) => RecipeError::MalformedPayload(e.to_string()),
            ApiConnectionError::EmptyContent => {
                RecipeError::MalformedPayload("model returned empty content".to_string())
            }
            other => RecipeError::ModelUnavailable(other),
        }
    }
}
