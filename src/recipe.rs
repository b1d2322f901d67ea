use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Nutrition per serving. Grams for everything except calories.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct Nutrition {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
}

impl Nutrition {
    fn is_non_negative(&self) -> bool {
        [self.calories, self.protein, self.carbs, self.fat, self.fiber]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ingredient {
    pub name: String,
    pub quantity: String,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Substitution {
    pub original: String,
    pub replacement: String,
    pub note: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownDifficulty(s.to_string()))
    }
}

/// A recipe as stored in the catalog. `nutrition` and every ingredient
/// quantity are relative to `servings`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub cuisine: String,
    pub difficulty: Difficulty,
    pub cooking_time_minutes: u32,
    pub servings: u32,
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub steps: Vec<String>,
    pub nutrition: Nutrition,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
    #[serde(default)]
    pub image_url: String,
    #[serde(rename = "isAIGenerated", default)]
    pub is_ai_generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Recipe {
    /// Checks the fields a recipe must carry before it is written to the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if self.cuisine.trim().is_empty() {
            return Err(ValidationError::MissingField("cuisine"));
        }
        if self.ingredients.is_empty() {
            return Err(ValidationError::EmptyIngredients);
        }
        if self.ingredients.iter().any(|i| i.name.trim().is_empty()) {
            return Err(ValidationError::MissingField("ingredient name"));
        }
        if self.servings == 0 {
            return Err(ValidationError::ServingsOutOfRange(0));
        }
        if !self.nutrition.is_non_negative() {
            return Err(ValidationError::NegativeNutrition);
        }
        Ok(())
    }

    pub fn has_all_tags(&self, tags: &[String]) -> bool {
        tags.iter().all(|tag| self.dietary_tags.iter().any(|t| t == tag))
    }
}

/// One user's rating of one recipe. Either field may be absent because
/// favorites and star ratings are written independently.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub recipe_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    pub created_at: DateTime<Utc>,
}

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Partial write to a rating document. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingUpdate {
    pub rating: Option<u8>,
    pub is_favorite: Option<bool>,
}

impl RatingUpdate {
    pub fn stars(rating: u8) -> Self {
        Self {
            rating: Some(rating),
            is_favorite: None,
        }
    }

    pub fn favorite(is_favorite: bool) -> Self {
        Self {
            rating: None,
            is_favorite: Some(is_favorite),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.rating {
            Some(r) if !(MIN_RATING..=MAX_RATING).contains(&r) => {
                Err(ValidationError::RatingOutOfRange(r))
            }
            _ => Ok(()),
        }
    }

    /// Folds this update into an existing rating (or a fresh one).
    pub fn apply(&self, existing: Option<Rating>, recipe_id: &str, now: DateTime<Utc>) -> Rating {
        let mut rating = existing.unwrap_or_else(|| Rating {
            recipe_id: recipe_id.to_string(),
            rating: None,
            is_favorite: None,
            created_at: now,
        });
        rating.recipe_id = recipe_id.to_string();
        rating.created_at = now;
        if let Some(stars) = self.rating {
            rating.rating = Some(stars);
        }
        if let Some(favorite) = self.is_favorite {
            rating.is_favorite = Some(favorite);
        }
        rating
    }
}

/// Ingredient detected in a photo by the vision model.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DetectedIngredient {
    pub name: String,
    pub confidence: f64,
}

/// Filters a user can apply when browsing the catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilters {
    pub difficulty: Option<Difficulty>,
    pub max_cooking_time: Option<u32>,
    pub cuisine: Option<String>,
    pub dietary_tags: Vec<String>,
    pub search_query: Option<String>,
}

impl RecipeFilters {
    /// Filters the store cannot express in a single query.
    pub fn matches_in_process(&self, recipe: &Recipe) -> bool {
        if let Some(max) = self.max_cooking_time {
            if recipe.cooking_time_minutes > max {
                return false;
            }
        }
        if !recipe.has_all_tags(&self.dietary_tags) {
            return false;
        }
        match self.search_query.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => recipe.title.to_lowercase().contains(&q.to_lowercase()),
            _ => true,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn recipe(id: &str, cuisine: &str) -> Recipe {
        Recipe {
            id: id.to_string(),
            title: format!("{cuisine} dish {id}"),
            description: String::new(),
            cuisine: cuisine.to_string(),
            difficulty: Difficulty::Easy,
            cooking_time_minutes: 30,
            servings: 4,
            ingredients: vec![Ingredient {
                name: "tomato".to_string(),
                quantity: "2 cups".to_string(),
                optional: false,
            }],
            steps: vec!["Cook.".to_string()],
            nutrition: Nutrition {
                calories: 400.0,
                protein: 12.0,
                carbs: 50.0,
                fat: 10.0,
                fiber: 4.0,
            },
            dietary_tags: vec![],
            substitutions: vec![],
            image_url: String::new(),
            is_ai_generated: false,
            author_id: None,
            created_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::recipe;
    use super::*;

    #[test]
    fn test_rating_update_preserves_absent_fields() {
        let t0 = Utc::now();
        let first = RatingUpdate::stars(5).apply(None, "r1", t0);
        let merged = RatingUpdate::favorite(true).apply(Some(first), "r1", t0);
        assert_eq!(merged.rating, Some(5));
        assert_eq!(merged.is_favorite, Some(true));
    }

    #[test]
    fn test_rating_update_validation() {
        assert!(RatingUpdate::stars(0).validate().is_err());
        assert!(RatingUpdate::stars(6).validate().is_err());
        assert!(RatingUpdate::stars(3).validate().is_ok());
        assert!(RatingUpdate::favorite(false).validate().is_ok());
    }

    #[test]
    fn test_recipe_validation_rejects_empty_ingredients() {
        let mut r = recipe("a", "Thai");
        r.ingredients.clear();
        assert_eq!(r.validate(), Err(ValidationError::EmptyIngredients));
    }

    #[test]
    fn test_recipe_json_uses_store_field_names() {
        let mut r = recipe("a", "Thai");
        r.is_ai_generated = true;
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["isAIGenerated"], serde_json::json!(true));
        assert_eq!(json["cookingTimeMinutes"], serde_json::json!(30));
        assert_eq!(json["difficulty"], serde_json::json!("easy"));
    }

    #[test]
    fn test_filters_in_process() {
        let mut r = recipe("a", "Thai");
        r.dietary_tags = vec!["vegan".to_string(), "gluten-free".to_string()];
        let filters = RecipeFilters {
            max_cooking_time: Some(30),
            dietary_tags: vec!["vegan".to_string()],
            search_query: Some("THAI".to_string()),
            ..Default::default()
        };
        assert!(filters.matches_in_process(&r));

        let too_slow = RecipeFilters {
            max_cooking_time: Some(15),
            ..Default::default()
        };
        assert!(!too_slow.matches_in_process(&r));

        let keto = RecipeFilters {
            dietary_tags: vec!["keto".to_string()],
            ..Default::default()
        };
        assert!(!keto.matches_in_process(&r));
    }

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!("Medium".parse::<Difficulty>(), Ok(Difficulty::Medium));
        assert!("impossible".parse::<Difficulty>().is_err());
    }
}
