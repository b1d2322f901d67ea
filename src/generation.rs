//! Request-level operations: generation with catalog fallback, ingredient
//! recognition, ratings, favourites, search, suggestions and saving
//! generated recipes.

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::api_connection::connection::ApiConnectionError;
use crate::api_connection::endpoints::ChatMessage;
use crate::api_connection::{GenerativeModel, ModelResponse, StructuredRequest};
use crate::config::EngineConfig;
use crate::errors::{RecipeError, ValidationError};
use crate::ingestor::{GenerationSession, IngestionFailure, StreamIngestor};
use crate::prompts::{
    build_ingredient_recognition_prompt, build_recipe_prompt, ingredient_recognition_schema,
    recipes_response_schema,
};
use crate::ranker::PreferenceRanker;
use crate::recipe::{DetectedIngredient, Rating, RatingUpdate, Recipe, RecipeFilters};
use crate::store::{resolve_existing, DocumentStore, RecipeQuery};

pub const PARSE_FAILURE_NOTICE: &str = "Could not parse AI response. Showing saved recipes.";
pub const GENERATION_FAILURE_NOTICE: &str = "Recipe generation failed. Showing saved recipes.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub ingredients: Vec<String>,
    pub dietary: Vec<String>,
    /// Applied to the catalog search used when generation fails.
    pub fallback_filters: RecipeFilters,
}

impl GenerationRequest {
    pub fn new(ingredients: Vec<String>, dietary: Vec<String>) -> Self {
        Self {
            ingredients,
            dietary,
            fallback_filters: RecipeFilters::default(),
        }
    }

    fn cleaned_ingredients(&self) -> Result<Vec<String>, ValidationError> {
        let cleaned: Vec<String> = self
            .ingredients
            .iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect();
        if cleaned.is_empty() {
            return Err(ValidationError::EmptyIngredients);
        }
        Ok(cleaned)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Generated(GenerationSession),
    /// Generation failed; these are saved catalog recipes instead.
    Fallback {
        recipes: Vec<Recipe>,
        notice: &'static str,
    },
}

impl GenerationOutcome {
    pub fn recipes(&self) -> &[Recipe] {
        match self {
            GenerationOutcome::Generated(session) => session.recipes(),
            GenerationOutcome::Fallback { recipes, .. } => recipes.as_slice(),
        }
    }

    pub fn notice(&self) -> Option<&'static str> {
        match self {
            GenerationOutcome::Generated(_) => None,
            GenerationOutcome::Fallback { notice, .. } => Some(*notice),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecognitionPayload {
    ingredients: Vec<DetectedIngredient>,
}

/// Keeps names the model actually gave and pulls confidence into `[0, 1]`.
pub fn sanitize_detections(detections: Vec<DetectedIngredient>) -> Vec<DetectedIngredient> {
    detections
        .into_iter()
        .filter_map(|d| {
            let name = d.name.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let confidence = if d.confidence.is_finite() {
                d.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            };
            Some(DetectedIngredient { name, confidence })
        })
        .collect()
}

pub struct RecipeService<'a> {
    config: &'a EngineConfig,
    store: &'a dyn DocumentStore,
    model: &'a dyn GenerativeModel,
}

impl<'a> RecipeService<'a> {
    pub fn new(
        config: &'a EngineConfig,
        store: &'a dyn DocumentStore,
        model: &'a dyn GenerativeModel,
    ) -> Self {
        Self {
            config,
            store,
            model,
        }
    }

    /// Streams fresh recipes from the model. Any model or payload failure
    /// degrades to a catalog search; only bad input or an unreachable store
    /// is an error.
    #[instrument(skip(self, request), fields(ingredients = request.ingredients.len()))]
    pub async fn generate_recipes(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, RecipeError> {
        let ingredients = request.cleaned_ingredients()?;
        let prompt = build_recipe_prompt(&ingredients, &request.dietary);

        let structured = StructuredRequest {
            messages: vec![ChatMessage::user(prompt)],
            schema: recipes_response_schema(),
            max_tokens: self.config.model.generation_max_tokens,
            stream: true,
        };

        let response = match self.model.generate_structured(structured).await {
            Ok(response) => response,
            // Single-shot content that did not parse is a payload failure.
            Err(e @ (ApiConnectionError::SerializationError(_) | ApiConnectionError::EmptyContent)) => {
                debug!(error = %e, "unparseable generation");
                return self.fallback(&request.fallback_filters, PARSE_FAILURE_NOTICE).await;
            }
            Err(e) => {
                warn!(error = %e, "generation request failed, falling back to catalog");
                return self.fallback(&request.fallback_filters, GENERATION_FAILURE_NOTICE).await;
            }
        };

        match StreamIngestor::new().ingest_response(response).await {
            Ok(recipes) => {
                info!(count = recipes.len(), "generation complete");
                Ok(GenerationOutcome::Generated(GenerationSession::new(recipes)))
            }
            Err(failure @ IngestionFailure::Malformed { .. }) => {
                debug!(error = %failure, "unparseable generation");
                self.fallback(&request.fallback_filters, PARSE_FAILURE_NOTICE).await
            }
            Err(IngestionFailure::Transport(e)) => {
                warn!(error = %e, "generation stream failed, falling back to catalog");
                self.fallback(&request.fallback_filters, GENERATION_FAILURE_NOTICE).await
            }
        }
    }

    async fn fallback(
        &self,
        filters: &RecipeFilters,
        notice: &'static str,
    ) -> Result<GenerationOutcome, RecipeError> {
        let recipes = self.search_recipes(filters).await?;
        Ok(GenerationOutcome::Fallback { recipes, notice })
    }

    /// Detects food items in a photo. Non-food filtering is the prompt's
    /// job; here only blank names are dropped and confidences clamped.
    #[instrument(skip(self, image), fields(bytes = image.len()))]
    pub async fn recognize_ingredients(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<Vec<DetectedIngredient>, RecipeError> {
        if image.is_empty() {
            return Err(ValidationError::EmptyImage.into());
        }
        let data_url = format!(
            "data:{};base64,{}",
            mime_type,
            general_purpose::STANDARD.encode(image)
        );
        let request = StructuredRequest {
            messages: vec![ChatMessage::user_with_image(
                data_url,
                build_ingredient_recognition_prompt(),
            )],
            schema: ingredient_recognition_schema(),
            max_tokens: self.config.model.recognition_max_tokens,
            stream: false,
        };

        let value = match self.model.generate_structured(request).await? {
            ModelResponse::Complete(value) => value,
            ModelResponse::Stream(mut stream) => {
                let mut buffer = Vec::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                serde_json::from_slice(&buffer)
                    .map_err(|e| RecipeError::MalformedPayload(e.to_string()))?
            }
        };
        let payload: RecognitionPayload = serde_json::from_value(value)
            .map_err(|e| RecipeError::MalformedPayload(e.to_string()))?;

        let detections = sanitize_detections(payload.ingredients);
        debug!(count = detections.len(), "recognized ingredients");
        Ok(detections)
    }

    /// Star rating and/or favourite flag. Fields left out of `update` keep
    /// their stored values.
    #[instrument(skip(self))]
    pub async fn rate_recipe(
        &self,
        user_id: &str,
        recipe_id: &str,
        update: &RatingUpdate,
    ) -> Result<Rating, RecipeError> {
        if user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("userId").into());
        }
        update.validate()?;

        if self.store.get_recipe(recipe_id).await?.is_none() {
            return Err(RecipeError::NotFound {
                kind: "recipe",
                id: recipe_id.to_string(),
            });
        }
        let rating = self.store.upsert_rating(user_id, recipe_id, update).await?;
        debug!(?rating, "rating stored");
        Ok(rating)
    }

    #[instrument(skip(self))]
    pub async fn search_recipes(&self, filters: &RecipeFilters) -> Result<Vec<Recipe>, RecipeError> {
        let query = RecipeQuery::from_filters(filters, self.config.search_limit);
        let recipes: Vec<Recipe> = self
            .store
            .query_recipes(&query)
            .await?
            .into_iter()
            .filter(|r| filters.matches_in_process(r))
            .collect();
        debug!(count = recipes.len(), "search complete");
        Ok(recipes)
    }

    pub async fn suggest(&self, user_id: &str) -> Result<Vec<Recipe>, RecipeError> {
        if user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("userId").into());
        }
        PreferenceRanker::new(self.store, &self.config.ranker)
            .suggest(user_id, self.config.ranker.suggestion_limit)
            .await
    }

    /// Recipes the user marked as favourite. Favourites whose recipe was
    /// deleted are left out.
    #[instrument(skip(self))]
    pub async fn favorites(&self, user_id: &str) -> Result<Vec<Recipe>, RecipeError> {
        if user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("userId").into());
        }
        let ratings = self.store.favorite_ratings(user_id).await?;
        let ids: Vec<&str> = ratings.iter().map(|r| r.recipe_id.as_str()).collect();
        let recipes = resolve_existing(self.store, &ids).await?;
        debug!(favorites = ids.len(), resolved = recipes.len(), "favorites loaded");
        Ok(recipes)
    }

    /// Resolves a recipe for the detail view. Local ids are answered from the
    /// generation session without touching the model or the store.
    pub async fn get_recipe(
        &self,
        id: &str,
        session: Option<&GenerationSession>,
    ) -> Result<Recipe, RecipeError> {
        let found = if GenerationSession::is_local_id(id) {
            session.and_then(|s| s.get(id)).cloned()
        } else {
            self.store.get_recipe(id).await?
        };
        found.ok_or_else(|| RecipeError::NotFound {
            kind: "recipe",
            id: id.to_string(),
        })
    }

    /// Persists a generated recipe into the catalog under a new store id and
    /// marks it as the user's favourite.
    #[instrument(skip(self, recipe), fields(title = %recipe.title))]
    pub async fn save_generated_recipe(
        &self,
        user_id: &str,
        recipe: &Recipe,
    ) -> Result<Recipe, RecipeError> {
        if user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("userId").into());
        }
        recipe.validate()?;

        let record = Recipe {
            id: String::new(),
            is_ai_generated: true,
            author_id: Some(user_id.to_string()),
            created_at: Some(Utc::now()),
            ..recipe.clone()
        };
        let saved = self.store.insert_recipe(record).await?;
        info!(recipe_id = %saved.id, "saved generated recipe");

        if let Err(e) = self
            .store
            .upsert_rating(user_id, &saved.id, &RatingUpdate::favorite(true))
            .await
        {
            // The recipe is saved; the favourite flag can be set again later.
            warn!(error = %e, recipe_id = %saved.id, "could not mark saved recipe as favorite");
        }
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_detections() {
        let raw = vec![
            DetectedIngredient {
                name: " tomato ".to_string(),
                confidence: 1.4,
            },
            DetectedIngredient {
                name: "".to_string(),
                confidence: 0.9,
            },
            DetectedIngredient {
                name: "basil".to_string(),
                confidence: -0.2,
            },
            DetectedIngredient {
                name: "onion".to_string(),
                confidence: f64::NAN,
            },
        ];
        let clean = sanitize_detections(raw);
        assert_eq!(clean.len(), 3);
        assert_eq!(clean[0].name, "tomato");
        assert_eq!(clean[0].confidence, 1.0);
        assert_eq!(clean[1].confidence, 0.0);
        assert_eq!(clean[2].confidence, 0.0);
    }

    #[test]
    fn test_request_requires_an_ingredient() {
        let blank = GenerationRequest::new(vec!["  ".to_string()], vec![]);
        assert_eq!(blank.cleaned_ingredients(), Err(ValidationError::EmptyIngredients));
        let ok = GenerationRequest::new(vec![" tomato".to_string(), "".to_string()], vec![]);
        assert_eq!(ok.cleaned_ingredients().unwrap(), vec!["tomato".to_string()]);
    }
}
