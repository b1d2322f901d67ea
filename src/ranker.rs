use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

use crate::config::RankerSettings;
use crate::errors::RecipeError;
use crate::recipe::{Rating, Recipe};
use crate::store::{resolve_existing, DocumentStore, RecipeQuery};

/// Cuisine counts for one suggestion request, remembering the order in
/// which each cuisine was first seen.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CuisineTally {
    counts: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl CuisineTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, cuisine: &str) {
        match self.index.get(cuisine) {
            Some(&slot) => self.counts[slot].1 += 1,
            None => {
                self.index.insert(cuisine.to_string(), self.counts.len());
                self.counts.push((cuisine.to_string(), 1));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn count(&self, cuisine: &str) -> usize {
        self.index.get(cuisine).map_or(0, |&slot| self.counts[slot].1)
    }

    /// Cuisines by descending count; equal counts keep first-seen order.
    pub fn ranked(&self) -> Vec<&str> {
        let mut ranked: Vec<&(String, usize)> = self.counts.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.into_iter().map(|(cuisine, _)| cuisine.as_str()).collect()
    }

    pub fn top(&self, n: usize) -> Vec<String> {
        self.ranked().into_iter().take(n).map(str::to_string).collect()
    }
}

/// Derives favourite cuisines from a user's rating history and picks
/// recipes from them that the user has not already rated highly.
pub struct PreferenceRanker<'a> {
    store: &'a dyn DocumentStore,
    settings: &'a RankerSettings,
}

impl<'a> PreferenceRanker<'a> {
    pub fn new(store: &'a dyn DocumentStore, settings: &'a RankerSettings) -> Self {
        Self { store, settings }
    }

    /// Suggests up to `limit` recipes. A user with no usable history gets a
    /// plain catalog slice. Fails only when the store itself is unreachable.
    #[instrument(skip(self), fields(window = self.settings.ratings_window))]
    pub async fn suggest(&self, user_id: &str, limit: usize) -> Result<Vec<Recipe>, RecipeError> {
        let window = self.settings.ratings_window;
        let ratings = self.store.ratings_by_score(user_id, window).await?;
        debug!(count = ratings.len(), "fetched ratings");

        if ratings.is_empty() {
            debug!("no ratings, using catalog fallback");
            return self.catalog_fallback(limit).await;
        }

        let high_rated_ids: Vec<&str> = ratings
            .iter()
            .filter(|r| self.is_liked(r))
            .map(|r| r.recipe_id.as_str())
            .collect();

        let tally = self.tally_cuisines(&high_rated_ids).await?;
        let top_cuisines = tally.top(self.settings.top_cuisines);
        debug!(?top_cuisines, "ranked cuisines");

        if top_cuisines.is_empty() {
            return self.catalog_fallback(limit).await;
        }

        let liked = self.all_liked_ids(user_id, &ratings).await?;
        let candidates = self
            .store
            .query_recipes(&RecipeQuery::cuisines(top_cuisines, limit))
            .await?;
        Ok(candidates
            .into_iter()
            .filter(|recipe| !liked.contains(&recipe.id))
            .collect())
    }

    fn is_liked(&self, rating: &Rating) -> bool {
        rating
            .rating
            .is_some_and(|stars| stars >= self.settings.high_rating_threshold)
    }

    /// Every recipe the user rated at or above the threshold. The tally
    /// window is reused when it already holds all scored ratings.
    async fn all_liked_ids(
        &self,
        user_id: &str,
        window: &[Rating],
    ) -> Result<HashSet<String>, RecipeError> {
        let liked_in = |ratings: &[Rating]| {
            ratings
                .iter()
                .filter(|r| self.is_liked(r))
                .map(|r| r.recipe_id.clone())
                .collect::<HashSet<String>>()
        };
        if window.len() < self.settings.ratings_window {
            return Ok(liked_in(window));
        }
        let all = self.store.ratings_by_score(user_id, usize::MAX).await?;
        debug!(count = all.len(), "fetched full rating history for exclusion");
        Ok(liked_in(&all))
    }

    /// Resolves each liked recipe concurrently, then counts cuisines in
    /// rating order on this task only.
    pub async fn tally_cuisines(&self, recipe_ids: &[&str]) -> Result<CuisineTally, RecipeError> {
        let recipes = resolve_existing(self.store, recipe_ids).await?;
        let mut tally = CuisineTally::new();
        for recipe in &recipes {
            tally.record(&recipe.cuisine);
        }
        Ok(tally)
    }

    async fn catalog_fallback(&self, limit: usize) -> Result<Vec<Recipe>, RecipeError> {
        Ok(self.store.query_recipes(&RecipeQuery::catalog(limit)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_ranks_by_count_then_first_seen() {
        let mut tally = CuisineTally::new();
        for cuisine in ["Thai", "Italian", "Italian", "Mexican", "Thai", "Italian"] {
            tally.record(cuisine);
        }
        assert_eq!(tally.ranked(), vec!["Italian", "Thai", "Mexican"]);
        assert_eq!(tally.count("Italian"), 3);
        assert_eq!(tally.count("Greek"), 0);
    }

    #[test]
    fn test_tally_ties_keep_encounter_order() {
        let mut tally = CuisineTally::new();
        for cuisine in ["Korean", "Greek", "French", "Greek", "Korean"] {
            tally.record(cuisine);
        }
        assert_eq!(tally.top(2), vec!["Korean".to_string(), "Greek".to_string()]);
    }

    #[test]
    fn test_empty_tally_has_no_top() {
        let tally = CuisineTally::new();
        assert!(tally.is_empty());
        assert!(tally.top(2).is_empty());
    }
}
