use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::recipe::{Difficulty, RecipeFilters};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON recipe catalog
    #[arg(short, long, global = true, default_value = "recipes.json")]
    pub catalog: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show a catalog recipe at a different serving count
    Scale {
        #[arg(long)]
        recipe_id: String,
        /// Target servings (clamped to 1-20)
        #[arg(short, long)]
        servings: u32,
    },
    /// Suggest recipes from a user's rating history
    Suggest {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, default_value = "ratings.csv")]
        ratings: PathBuf,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List a user's favourite recipes
    Favorites {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, default_value = "ratings.csv")]
        ratings: PathBuf,
    },
    /// Search the catalog
    Search(SearchArgs),
    /// Rate a recipe and/or mark it as favorite
    Rate {
        #[arg(short, long)]
        user: String,
        #[arg(long)]
        recipe_id: String,
        #[arg(short, long, default_value = "ratings.csv")]
        ratings: PathBuf,
        /// Stars from 1 to 5
        #[arg(long)]
        stars: Option<u8>,
        #[arg(long)]
        favorite: Option<bool>,
    },
    /// Generate recipes from ingredients with the model
    Generate {
        /// Comma-separated ingredients, e.g. "tomato,basil"
        #[arg(short, long, value_delimiter = ',', required = true)]
        ingredients: Vec<String>,
        /// Comma-separated dietary restrictions
        #[arg(short, long, value_delimiter = ',')]
        dietary: Vec<String>,
        /// Show the first recipe scaled to this many servings
        #[arg(short, long)]
        servings: Option<u32>,
        /// Save the generated recipes for this user
        #[arg(long)]
        save_for: Option<String>,
        #[arg(short, long, default_value = "ratings.csv")]
        ratings: PathBuf,
    },
    /// Detect ingredients in a photo
    Recognize {
        #[arg(long)]
        image: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    #[arg(long)]
    pub difficulty: Option<String>,
    #[arg(long)]
    pub max_time: Option<u32>,
    #[arg(long)]
    pub cuisine: Option<String>,
    /// Comma-separated tags the recipe must all carry
    #[arg(long, value_delimiter = ',')]
    pub dietary: Vec<String>,
    /// Case-insensitive title search
    #[arg(short, long)]
    pub query: Option<String>,
}

impl SearchArgs {
    pub fn to_filters(&self) -> Result<RecipeFilters, crate::errors::ValidationError> {
        let difficulty = self
            .difficulty
            .as_deref()
            .map(str::parse::<Difficulty>)
            .transpose()?;
        Ok(RecipeFilters {
            difficulty,
            max_cooking_time: self.max_time,
            cuisine: self.cuisine.clone(),
            dietary_tags: self
                .dietary
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            search_query: self.query.clone(),
        })
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
