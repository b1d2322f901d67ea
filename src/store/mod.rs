//! Document store seam. The engine reads recipes and ratings through
//! [`DocumentStore`] and never keeps references past one operation.

pub mod memory;

use async_trait::async_trait;
use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use crate::recipe::{Difficulty, Rating, RatingUpdate, Recipe, RecipeFilters};

pub use memory::MemoryStore;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// The store itself could not be reached. Retryable by the caller.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A single document exists but could not be decoded.
    #[error("malformed document {collection}/{id}: {reason}")]
    Malformed {
        collection: &'static str,
        id: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryOrder {
    /// Whatever order the store iterates in.
    #[default]
    Natural,
    NewestFirst,
}

/// Equality filters plus an ordered, limited read over the recipe catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeQuery {
    /// Matches when the recipe's cuisine is any of these. Empty matches all.
    pub cuisine_in: Vec<String>,
    pub difficulty: Option<Difficulty>,
    pub order: QueryOrder,
    pub limit: usize,
}

impl RecipeQuery {
    /// An arbitrary slice of the catalog.
    pub fn catalog(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn cuisines(cuisines: Vec<String>, limit: usize) -> Self {
        Self {
            cuisine_in: cuisines,
            limit,
            ..Default::default()
        }
    }

    /// The part of `filters` the store can evaluate itself, newest first.
    pub fn from_filters(filters: &RecipeFilters, limit: usize) -> Self {
        Self {
            cuisine_in: filters.cuisine.iter().cloned().collect(),
            difficulty: filters.difficulty,
            order: QueryOrder::NewestFirst,
            limit,
        }
    }

    pub fn matches(&self, recipe: &Recipe) -> bool {
        (self.cuisine_in.is_empty() || self.cuisine_in.iter().any(|c| *c == recipe.cuisine))
            && self.difficulty.is_none_or(|d| d == recipe.difficulty)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_recipe(&self, id: &str) -> Result<Option<Recipe>, StoreError>;

    async fn query_recipes(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, StoreError>;

    /// Stores a new recipe under a store-assigned id and returns it.
    async fn insert_recipe(&self, recipe: Recipe) -> Result<Recipe, StoreError>;

    /// Up to `limit` of the user's ratings that carry a star value, highest
    /// first. Equal scores keep the store's own iteration order.
    async fn ratings_by_score(&self, user_id: &str, limit: usize) -> Result<Vec<Rating>, StoreError>;

    /// The user's ratings with `isFavorite == true`, in store order.
    async fn favorite_ratings(&self, user_id: &str) -> Result<Vec<Rating>, StoreError>;

    /// Merge-writes one rating. Fields absent from `update` are preserved.
    async fn upsert_rating(
        &self,
        user_id: &str,
        recipe_id: &str,
        update: &RatingUpdate,
    ) -> Result<Rating, StoreError>;
}

/// Looks up `ids` concurrently and returns the recipes that still exist, in
/// the order of `ids`. Deleted or undecodable recipes are skipped; only an
/// unreachable store fails the whole read.
pub async fn resolve_existing(
    store: &dyn DocumentStore,
    ids: &[&str],
) -> Result<Vec<Recipe>, StoreError> {
    let lookups = join_all(ids.iter().map(|id| store.get_recipe(id))).await;

    let mut found = Vec::with_capacity(ids.len());
    for (id, lookup) in ids.iter().zip(lookups) {
        match lookup {
            Ok(Some(recipe)) => found.push(recipe),
            Ok(None) => debug!(recipe_id = %id, "recipe no longer exists, skipping"),
            Err(err @ StoreError::Unavailable(_)) => return Err(err),
            Err(err) => warn!(recipe_id = %id, error = %err, "skipping unreadable recipe"),
        }
    }
    Ok(found)
}
