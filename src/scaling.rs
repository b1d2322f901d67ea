use crate::quantity_parser::parse_quantity;
use crate::recipe::{Ingredient, Nutrition, Recipe};

/// Serving range offered to users. The scaling functions themselves accept
/// any positive target.
pub const MIN_SERVINGS: u32 = 1;
pub const MAX_SERVINGS: u32 = 20;

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn ratio(from_servings: f64, to_servings: f64) -> Option<f64> {
    if from_servings <= 0.0 {
        None
    } else {
        Some(to_servings / from_servings)
    }
}

/// Rescales per-serving nutrition. Calories round to a whole number, the
/// other fields to one decimal. A non-positive `from_servings` returns the
/// input untouched.
pub fn scale_nutrition(nutrition: &Nutrition, from_servings: f64, to_servings: f64) -> Nutrition {
    let Some(factor) = ratio(from_servings, to_servings) else {
        return *nutrition;
    };

    Nutrition {
        calories: (nutrition.calories * factor).round(),
        protein: round_one_decimal(nutrition.protein * factor),
        carbs: round_one_decimal(nutrition.carbs * factor),
        fat: round_one_decimal(nutrition.fat * factor),
        fiber: round_one_decimal(nutrition.fiber * factor),
    }
}

pub fn scale_ingredient(ingredient: &Ingredient, factor: f64) -> Ingredient {
    match parse_quantity(&ingredient.quantity) {
        Some(parsed) => {
            let scaled = round_one_decimal(parsed.magnitude * factor);
            Ingredient {
                quantity: format!("{} {}", scaled, parsed.unit).trim().to_string(),
                ..ingredient.clone()
            }
        }
        None => ingredient.clone(),
    }
}

/// Rescales each quantity with a parseable leading number. Quantities like
/// "a pinch" pass through unchanged; names and optional flags never change.
pub fn scale_ingredients(
    ingredients: &[Ingredient],
    from_servings: f64,
    to_servings: f64,
) -> Vec<Ingredient> {
    let Some(factor) = ratio(from_servings, to_servings) else {
        return ingredients.to_vec();
    };
    ingredients
        .iter()
        .map(|ingredient| scale_ingredient(ingredient, factor))
        .collect()
}

/// Display-only view of a recipe at a chosen serving count. The underlying
/// recipe is never modified.
#[derive(Debug, Clone)]
pub struct ServingView<'a> {
    recipe: &'a Recipe,
    servings: u32,
}

impl<'a> ServingView<'a> {
    /// Opens the view at `servings`, clamped into the offered range.
    pub fn new(recipe: &'a Recipe, servings: u32) -> Self {
        Self {
            recipe,
            servings: servings.clamp(MIN_SERVINGS, MAX_SERVINGS),
        }
    }

    /// Opens the view at the recipe's own serving count.
    pub fn baseline(recipe: &'a Recipe) -> Self {
        Self::new(recipe, recipe.servings)
    }

    pub fn servings(&self) -> u32 {
        self.servings
    }

    pub fn recipe(&self) -> &Recipe {
        self.recipe
    }

    pub fn increment(&mut self) {
        self.servings = (self.servings + 1).min(MAX_SERVINGS);
    }

    pub fn decrement(&mut self) {
        self.servings = self.servings.saturating_sub(1).max(MIN_SERVINGS);
    }

    pub fn set_servings(&mut self, servings: u32) {
        self.servings = servings.clamp(MIN_SERVINGS, MAX_SERVINGS);
    }

    pub fn nutrition(&self) -> Nutrition {
        scale_nutrition(
            &self.recipe.nutrition,
            f64::from(self.recipe.servings),
            f64::from(self.servings),
        )
    }

    pub fn ingredients(&self) -> Vec<Ingredient> {
        scale_ingredients(
            &self.recipe.ingredients,
            f64::from(self.recipe.servings),
            f64::from(self.servings),
        )
    }
}
