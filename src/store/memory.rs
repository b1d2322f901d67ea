use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::debug;

use super::{DocumentStore, QueryOrder, RecipeQuery, StoreError};
use crate::recipe::{Rating, RatingUpdate, Recipe};

/// Row layout of the ratings CSV file.
#[derive(Debug, Serialize, Deserialize)]
struct RatingRow {
    user_id: String,
    recipe_id: String,
    rating: Option<u8>,
    is_favorite: Option<bool>,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Collections {
    recipes: Vec<Recipe>,
    // user id -> ratings in insertion order
    ratings: HashMap<String, Vec<Rating>>,
}

/// Process-local document store. Iteration order is insertion order, which
/// is also the tie-break order for equal rating scores.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
    next_id: AtomicU64,
}

const ID_PREFIX: &str = "recipe-";

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recipes(recipes: Vec<Recipe>) -> Self {
        Self {
            inner: RwLock::new(Collections {
                recipes,
                ..Default::default()
            }),
            next_id: AtomicU64::new(0),
        }
    }

    /// Loads a JSON array of recipes. Recipes without an id get one assigned.
    pub fn load_catalog_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read recipe catalog at {:?}", path))?;
        let mut recipes: Vec<Recipe> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse recipe catalog at {:?}", path))?;

        // Continue numbering after ids this store handed out previously.
        let highest = recipes
            .iter()
            .filter_map(|r| r.id.strip_prefix(ID_PREFIX)?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        let store = Self {
            next_id: AtomicU64::new(highest),
            ..Self::new()
        };
        for recipe in recipes.iter_mut().filter(|r| r.id.is_empty()) {
            recipe.id = store.allocate_id();
        }
        debug!(count = recipes.len(), path = ?path, "loaded recipe catalog");
        store.inner.write().map_err(poisoned)?.recipes = recipes;
        Ok(store)
    }

    pub fn save_catalog_json(&self, path: &Path) -> Result<()> {
        let inner = self.inner.read().map_err(poisoned)?;
        let json = serde_json::to_string_pretty(&inner.recipes)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write recipe catalog to {:?}", path))
    }

    /// Adds ratings from a CSV file with columns
    /// `user_id,recipe_id,rating,is_favorite,created_at`.
    pub fn load_ratings_csv(&self, path: &Path) -> Result<()> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("Failed to open ratings CSV at {:?}", path))?;
        let mut inner = self.inner.write().map_err(poisoned)?;
        let mut loaded = 0usize;
        for (row_index, result) in rdr.deserialize::<RatingRow>().enumerate() {
            let row = result.with_context(|| format!("Failed to read rating at row {}", row_index + 1))?;
            inner.ratings.entry(row.user_id).or_default().push(Rating {
                recipe_id: row.recipe_id,
                rating: row.rating,
                is_favorite: row.is_favorite,
                created_at: row.created_at,
            });
            loaded += 1;
        }
        debug!(count = loaded, path = ?path, "loaded ratings");
        Ok(())
    }

    pub fn write_ratings_csv(&self, path: &Path) -> Result<()> {
        let inner = self.inner.read().map_err(poisoned)?;
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create ratings CSV at {:?}", path))?;
        let mut users: Vec<&String> = inner.ratings.keys().collect();
        users.sort();
        for user_id in users {
            for rating in &inner.ratings[user_id] {
                wtr.serialize(RatingRow {
                    user_id: user_id.clone(),
                    recipe_id: rating.recipe_id.clone(),
                    rating: rating.rating,
                    is_favorite: rating.is_favorite,
                    created_at: rating.created_at,
                })?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    fn allocate_id(&self) -> String {
        format!("{}{}", ID_PREFIX, self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_recipe(&self, id: &str) -> Result<Option<Recipe>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.recipes.iter().find(|r| r.id == id).cloned())
    }

    async fn query_recipes(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        let mut matched: Vec<&Recipe> = inner.recipes.iter().filter(|r| query.matches(r)).collect();
        if query.order == QueryOrder::NewestFirst {
            // Undated recipes sort last; sort is stable.
            matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        Ok(matched.into_iter().take(query.limit).cloned().collect())
    }

    async fn insert_recipe(&self, mut recipe: Recipe) -> Result<Recipe, StoreError> {
        recipe.id = self.allocate_id();
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.recipes.push(recipe.clone());
        Ok(recipe)
    }

    async fn ratings_by_score(&self, user_id: &str, limit: usize) -> Result<Vec<Rating>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        let mut scored: Vec<Rating> = inner
            .ratings
            .get(user_id)
            .map(|list| list.iter().filter(|r| r.rating.is_some()).cloned().collect())
            .unwrap_or_default();
        scored.sort_by(|a, b| b.rating.cmp(&a.rating));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn favorite_ratings(&self, user_id: &str) -> Result<Vec<Rating>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .ratings
            .get(user_id)
            .map(|list| {
                list.iter()
                    .filter(|r| r.is_favorite == Some(true))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert_rating(
        &self,
        user_id: &str,
        recipe_id: &str,
        update: &RatingUpdate,
    ) -> Result<Rating, StoreError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let list = inner.ratings.entry(user_id.to_string()).or_default();
        let now = Utc::now();
        match list.iter_mut().find(|r| r.recipe_id == recipe_id) {
            Some(existing) => {
                *existing = update.apply(Some(existing.clone()), recipe_id, now);
                Ok(existing.clone())
            }
            None => {
                let rating = update.apply(None, recipe_id, now);
                list.push(rating.clone());
                Ok(rating)
            }
        }
    }
}
