use crate::api_connection::endpoints::{JsonSchema, JsonSchemaDefinition};
use crate::recipe::Difficulty;

pub fn build_recipe_prompt(ingredients: &[String], dietary: &[String]) -> String {
    let dietary = if dietary.is_empty() {
        "none".to_string()
    } else {
        dietary.join(", ")
    };
    format!(
        "You are a professional chef and nutritionist. Generate 3-5 recipes using these ingredients:

Ingredients: {}
Dietary restrictions: {}

Requirements:
- Each recipe must include: title, description, cuisine, difficulty (easy/medium/hard), cooking time in minutes, servings, full ingredient list with quantities (each marked optional or not), step-by-step instructions, nutrition per serving (calories, protein, carbs, fat, fiber in grams), dietary tags, and 2-3 ingredient substitution suggestions.
- Write each ingredient quantity as a leading number or simple fraction followed by its unit (e.g. \"2 cups\", \"1/2 tsp\"), or a description such as \"a pinch\" when no amount applies.
- Prioritize recipes that use MOST of the provided ingredients.
- Include a mix of difficulties (easy, medium, hard).
- Be accurate with nutrition estimates.
- Make the recipes practical and delicious.
- For substitutions, include the original ingredient, the replacement, and a short note explaining why.
Respond ONLY with a JSON object of the form {{\"recipes\": [...]}} matching the provided schema. Do not include any explanatory text before or after it.",
        ingredients.join(", "),
        dietary
    )
}

pub fn build_ingredient_recognition_prompt() -> &'static str {
    "You are a food ingredient recognition expert. Look at this image carefully and list ALL food ingredients visible.

For each ingredient:
- Provide the common name (e.g. \"tomato\", \"chicken breast\", \"olive oil\")
- Estimate your confidence from 0.0 to 1.0

Only list actual food ingredients. Do not list:
- Kitchen utensils, plates, or containers
- Non-food items
- Decorative items

Be specific: say \"red bell pepper\" instead of just \"pepper\"."
}

fn recipe_item_schema() -> JsonSchema {
    let difficulties: Vec<&str> = Difficulty::ALL.iter().map(Difficulty::as_str).collect();
    JsonSchema::object(vec![
        ("title", JsonSchema::string()),
        ("description", JsonSchema::string()),
        ("cuisine", JsonSchema::string()),
        ("difficulty", JsonSchema::string_enum(&difficulties)),
        (
            "cookingTimeMinutes",
            JsonSchema::integer().describe("Total cooking time in minutes"),
        ),
        ("servings", JsonSchema::integer()),
        (
            "ingredients",
            JsonSchema::array(JsonSchema::object(vec![
                ("name", JsonSchema::string()),
                ("quantity", JsonSchema::string()),
                ("optional", JsonSchema::boolean()),
            ])),
        ),
        ("steps", JsonSchema::array(JsonSchema::string())),
        (
            "nutrition",
            JsonSchema::object(vec![
                ("calories", JsonSchema::number()),
                ("protein", JsonSchema::number()),
                ("carbs", JsonSchema::number()),
                ("fat", JsonSchema::number()),
                ("fiber", JsonSchema::number()),
            ])
            .describe("Per serving; grams except calories"),
        ),
        ("dietaryTags", JsonSchema::array(JsonSchema::string())),
        (
            "substitutions",
            JsonSchema::array(JsonSchema::object(vec![
                ("original", JsonSchema::string()),
                ("replacement", JsonSchema::string()),
                ("note", JsonSchema::string()),
            ])),
        ),
    ])
}

pub fn recipes_response_schema() -> JsonSchemaDefinition {
    JsonSchemaDefinition {
        name: "generated_recipes".to_string(),
        strict: Some(true),
        schema: JsonSchema::object(vec![("recipes", JsonSchema::array(recipe_item_schema()))]),
    }
}

pub fn ingredient_recognition_schema() -> JsonSchemaDefinition {
    JsonSchemaDefinition {
        name: "recognized_ingredients".to_string(),
        strict: Some(true),
        schema: JsonSchema::object(vec![(
            "ingredients",
            JsonSchema::array(JsonSchema::object(vec![
                (
                    "name",
                    JsonSchema::string().describe("Common name of the ingredient"),
                ),
                (
                    "confidence",
                    JsonSchema::number()
                        .range(0.0, 1.0)
                        .describe("Confidence score from 0.0 to 1.0"),
                ),
            ])),
        )]),
    }
}
