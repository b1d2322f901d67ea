use std::env;

pub const DEFAULT_API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";
pub const DEFAULT_MODEL: &str = "google/gemini-3-flash-preview";
pub const DEFAULT_API_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone, PartialEq)]
pub struct RankerSettings {
    /// How many of the user's top ratings are inspected.
    pub ratings_window: usize,
    /// Minimum star rating that counts as "liked".
    pub high_rating_threshold: u8,
    pub top_cuisines: usize,
    pub suggestion_limit: usize,
}

impl Default for RankerSettings {
    fn default() -> Self {
        Self {
            ratings_window: 10,
            high_rating_threshold: 4,
            top_cuisines: 2,
            suggestion_limit: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// Name of the environment variable holding the API key, not the key.
    pub api_key_env_var: String,
    pub model: String,
    pub api_base_url: String,
    pub site_url: String,
    pub app_name: String,
    pub temperature: Option<f32>,
    pub generation_max_tokens: Option<u32>,
    pub recognition_max_tokens: Option<u32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_key_env_var: DEFAULT_API_KEY_ENV_VAR.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            site_url: "http://localhost:3000".to_string(),
            app_name: "Smart Recipe Generator".to_string(),
            temperature: Some(0.7),
            generation_max_tokens: Some(16_384),
            recognition_max_tokens: Some(1_024),
        }
    }
}

/// Process-wide settings. Built once at startup and handed to each
/// component by reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub model: ModelSettings,
    pub ranker: RankerSettings,
    /// Row cap for catalog searches and generation fallbacks.
    pub search_limit: usize,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            search_limit: 50,
            ..Default::default()
        }
    }

    /// Defaults overridden by `.env` and the process environment.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let mut config = Self::new();
        let model = &mut config.model;
        if let Ok(var) = env::var("RECIPE_API_KEY_ENV_VAR") {
            model.api_key_env_var = var;
        }
        if let Ok(name) = env::var("RECIPE_MODEL") {
            model.model = name;
        }
        if let Ok(url) = env::var("RECIPE_API_BASE_URL") {
            model.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(url) = env::var("SITE_URL") {
            model.site_url = url;
        }
        if let Ok(name) = env::var("APP_NAME") {
            model.app_name = name;
        }
        if let Some(limit) = parse_env("RECIPE_SUGGESTION_LIMIT") {
            config.ranker.suggestion_limit = limit;
        }
        if let Some(limit) = parse_env("RECIPE_SEARCH_LIMIT") {
            config.search_limit = limit;
        }
        config
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.search_limit, 50);
        assert_eq!(config.ranker.ratings_window, 10);
        assert_eq!(config.ranker.high_rating_threshold, 4);
        assert_eq!(config.ranker.top_cuisines, 2);
        assert_eq!(config.ranker.suggestion_limit, 6);
        assert_eq!(config.model.api_key_env_var, "OPENROUTER_API_KEY");
    }
}
