use anyhow::{bail, Context, Result};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recipe_adapt::api_connection::connection::Provider;
use recipe_adapt::cli::{parse_args, Command};
use recipe_adapt::config::EngineConfig;
use recipe_adapt::generation::{GenerationOutcome, GenerationRequest, RecipeService};
use recipe_adapt::recipe::{RatingUpdate, Recipe};
use recipe_adapt::scaling::ServingView;
use recipe_adapt::store::MemoryStore;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recipe_adapt=info")))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn open_store(catalog: &Path) -> Result<MemoryStore> {
    if catalog.exists() {
        MemoryStore::load_catalog_json(catalog)
    } else {
        warn!(path = %catalog.display(), "catalog not found, starting empty");
        Ok(MemoryStore::new())
    }
}

fn load_ratings(store: &MemoryStore, ratings: &Path) -> Result<()> {
    if ratings.exists() {
        store.load_ratings_csv(ratings)?;
    }
    Ok(())
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

fn print_recipe(view: &ServingView<'_>) {
    let recipe = view.recipe();
    println!(
        "\n{} [{}] ({}, {}, {} min)",
        recipe.title,
        recipe.id,
        recipe.cuisine,
        recipe.difficulty.as_str(),
        recipe.cooking_time_minutes
    );
    if !recipe.description.is_empty() {
        println!("  {}", recipe.description);
    }
    println!("  Servings: {} (recipe makes {})", view.servings(), recipe.servings);
    println!("  Ingredients:");
    for ingredient in view.ingredients() {
        let optional = if ingredient.optional { " (optional)" } else { "" };
        println!("    - {} {}{}", ingredient.quantity, ingredient.name, optional);
    }
    let n = view.nutrition();
    println!(
        "  Nutrition: {} kcal, {} g protein, {} g carbs, {} g fat, {} g fiber",
        n.calories, n.protein, n.carbs, n.fat, n.fiber
    );
    for (idx, step) in recipe.steps.iter().enumerate() {
        println!("  {}. {}", idx + 1, step);
    }
    for sub in &recipe.substitutions {
        println!("  * {} -> {}: {}", sub.original, sub.replacement, sub.note);
    }
}

fn print_summary(recipes: &[Recipe]) {
    if recipes.is_empty() {
        println!("No recipes found.");
    }
    for recipe in recipes {
        println!(
            "{:<16} {:<40} {:<12} {:<7} {:>4} min",
            recipe.id,
            recipe.title,
            recipe.cuisine,
            recipe.difficulty.as_str(),
            recipe.cooking_time_minutes
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = parse_args();
    let config = EngineConfig::from_env();
    let provider = Provider::openrouter(&config.model);
    let store = open_store(&cli.catalog)
        .with_context(|| format!("Failed to load catalog '{}'", cli.catalog.display()))?;
    let service = RecipeService::new(&config, &store, &provider);

    match cli.command {
        Command::Scale {
            recipe_id,
            servings,
        } => {
            let recipe = service.get_recipe(&recipe_id, None).await?;
            print_recipe(&ServingView::new(&recipe, servings));
        }
        Command::Suggest {
            user,
            ratings,
            limit,
        } => {
            load_ratings(&store, &ratings)
                .with_context(|| format!("Failed to load ratings '{}'", ratings.display()))?;
            let mut recipes = service.suggest(&user).await?;
            if let Some(limit) = limit {
                recipes.truncate(limit);
            }
            print_summary(&recipes);
        }
        Command::Favorites { user, ratings } => {
            load_ratings(&store, &ratings)
                .with_context(|| format!("Failed to load ratings '{}'", ratings.display()))?;
            print_summary(&service.favorites(&user).await?);
        }
        Command::Search(args) => {
            let filters = args.to_filters()?;
            print_summary(&service.search_recipes(&filters).await?);
        }
        Command::Rate {
            user,
            recipe_id,
            ratings,
            stars,
            favorite,
        } => {
            if stars.is_none() && favorite.is_none() {
                bail!("Nothing to rate: pass --stars and/or --favorite");
            }
            load_ratings(&store, &ratings)
                .with_context(|| format!("Failed to load ratings '{}'", ratings.display()))?;
            let update = RatingUpdate {
                rating: stars,
                is_favorite: favorite,
            };
            let rating = service.rate_recipe(&user, &recipe_id, &update).await?;
            store
                .write_ratings_csv(&ratings)
                .with_context(|| format!("Failed to write ratings '{}'", ratings.display()))?;
            println!(
                "Rated {}: {} stars, favorite: {}",
                rating.recipe_id,
                rating.rating.map_or("-".to_string(), |r| r.to_string()),
                rating.is_favorite.unwrap_or(false)
            );
        }
        Command::Generate {
            ingredients,
            dietary,
            servings,
            save_for,
            ratings,
        } => {
            let request = GenerationRequest::new(ingredients, dietary);
            let outcome = service.generate_recipes(&request).await?;
            if let Some(notice) = outcome.notice() {
                eprintln!("{notice}");
            }
            print_summary(outcome.recipes());
            if let Some(first) = outcome.recipes().first() {
                let view = match servings {
                    Some(servings) => ServingView::new(first, servings),
                    None => ServingView::baseline(first),
                };
                print_recipe(&view);
            }

            if let (Some(user), GenerationOutcome::Generated(mut session)) = (save_for, outcome) {
                load_ratings(&store, &ratings)?;
                let local: Vec<Recipe> = session.recipes().to_vec();
                for recipe in &local {
                    let saved = service.save_generated_recipe(&user, recipe).await?;
                    session.replace(&recipe.id, saved);
                }
                store
                    .save_catalog_json(&cli.catalog)
                    .with_context(|| format!("Failed to write catalog '{}'", cli.catalog.display()))?;
                store
                    .write_ratings_csv(&ratings)
                    .with_context(|| format!("Failed to write ratings '{}'", ratings.display()))?;
                info!(count = session.len(), "saved generated recipes");
                print_summary(session.recipes());
            }
        }
        Command::Recognize { image } => {
            let bytes = fs::read(&image)
                .await
                .with_context(|| format!("Failed to read image '{}'", image.display()))?;
            let detections = service
                .recognize_ingredients(&bytes, mime_for(&image))
                .await?;
            if detections.is_empty() {
                println!("No ingredients detected.");
            }
            for d in detections {
                println!("{:<24} {:.0}%", d.name, d.confidence * 100.0);
            }
        }
    }

    Ok(())
}
