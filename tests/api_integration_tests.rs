use dotenv::dotenv;
use futures_util::StreamExt;
use recipe_adapt::api_connection::{
    connection::{ApiConnectionError, Provider},
    endpoints::{ChatCompletionRequest, ChatMessage, JsonSchema, JsonSchemaDefinition, ResponseFormat},
    GenerativeModel, ModelResponse, StructuredRequest,
};
use recipe_adapt::config::{ModelSettings, DEFAULT_API_KEY_ENV_VAR};
use recipe_adapt::ingestor::StreamIngestor;
use recipe_adapt::prompts::{build_recipe_prompt, recipes_response_schema};
use std::env;

fn setup_test_environment() {
    dotenv().ok();
}

fn settings_with_key_var(var: &str) -> ModelSettings {
    ModelSettings {
        api_key_env_var: var.to_string(),
        ..ModelSettings::default()
    }
}

fn has_live_key() -> bool {
    if env::var(DEFAULT_API_KEY_ENV_VAR).is_err() {
        println!("Skipping live test: {} not set.", DEFAULT_API_KEY_ENV_VAR);
        return false;
    }
    true
}

#[tokio::test]
async fn test_missing_api_key_error() {
    setup_test_environment();
    let provider = Provider::openrouter(&settings_with_key_var("THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ"));
    let request = ChatCompletionRequest {
        model: provider.model().to_string(),
        messages: vec![ChatMessage::user("Hello")],
        response_format: None,
        temperature: None,
        max_tokens: None,
        stream: false,
    };
    let result = provider.call_chat_completion(request).await;
    assert!(matches!(result, Err(ApiConnectionError::MissingApiKey(_))));
    if let Err(ApiConnectionError::MissingApiKey(key_name)) = result {
        assert_eq!(key_name, "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ");
    }
}

#[tokio::test]
async fn test_missing_api_key_on_structured_stream() {
    setup_test_environment();
    let provider = Provider::openrouter(&settings_with_key_var("ANOTHER_KEY_THAT_IS_NOT_SET_QWERTY"));
    let result = provider
        .generate_structured(StructuredRequest {
            messages: vec![ChatMessage::user("tomato")],
            schema: recipes_response_schema(),
            max_tokens: Some(64),
            stream: true,
        })
        .await;
    assert!(matches!(result, Err(ApiConnectionError::MissingApiKey(_))));
}

#[tokio::test]
#[ignore]
async fn test_successful_structured_call() {
    setup_test_environment();
    if !has_live_key() {
        return;
    }
    let provider = Provider::openrouter(&ModelSettings::default());

    let schema_def = JsonSchemaDefinition {
        name: "dish_details".to_string(),
        strict: Some(true),
        schema: JsonSchema::object(vec![
            ("title", JsonSchema::string().describe("Name of the dish.")),
            ("country", JsonSchema::string()),
        ]),
    };
    let request = ChatCompletionRequest {
        model: provider.model().to_string(),
        messages: vec![
            ChatMessage::system("You describe dishes in JSON following the provided schema."),
            ChatMessage::user("Describe the dish 'Margherita pizza'."),
        ],
        response_format: Some(ResponseFormat::json_schema(schema_def)),
        temperature: Some(0.2),
        max_tokens: Some(300),
        stream: false,
    };

    let result = provider.call_chat_completion(request).await;
    assert!(result.is_ok(), "API call failed: {:?}", result.err());
    let response = result.unwrap();
    let content = response.choices[0].message.content.clone().unwrap_or_default();
    let value: serde_json::Value = serde_json::from_str(
        recipe_adapt::api_connection::strip_code_fences(&content),
    )
    .unwrap_or_else(|e| panic!("Response content is not valid JSON ({e}): {content}"));
    assert!(value.get("title").is_some_and(|t| t.is_string()));
}

#[tokio::test]
#[ignore]
async fn test_streamed_recipe_generation() {
    setup_test_environment();
    if !has_live_key() {
        return;
    }
    let settings = ModelSettings::default();
    let provider = Provider::openrouter(&settings);
    let response = provider
        .generate_structured(StructuredRequest {
            messages: vec![ChatMessage::user(build_recipe_prompt(
                &["tomato".into(), "basil".into()],
                &[],
            ))],
            schema: recipes_response_schema(),
            max_tokens: settings.generation_max_tokens,
            stream: true,
        })
        .await
        .expect("stream should open");

    let ModelResponse::Stream(mut stream) = response else {
        panic!("expected a streamed response");
    };
    let mut ingestor = StreamIngestor::new();
    while let Some(chunk) = stream.next().await {
        ingestor.push_chunk(&chunk.expect("chunk")).expect("push");
    }
    let recipes = ingestor.finish().expect("parsable payload");
    assert!((3..=5).contains(&recipes.len()), "got {} recipes", recipes.len());
    assert!(recipes.iter().all(|r| r.is_ai_generated && r.id.starts_with("local-")));
}

#[tokio::test]
#[ignore]
async fn test_api_error_with_invalid_key() {
    setup_test_environment();

    const INVALID_KEY_ENV_NAME_FOR_THIS_TEST: &str = "ENV_VAR_WITH_BAD_KEY_VALUE";
    unsafe {
        std::env::set_var(
            INVALID_KEY_ENV_NAME_FOR_THIS_TEST,
            "this_is_a_deliberately_bad_api_key_string_for_testing",
        );
    }

    let provider = Provider::openrouter(&settings_with_key_var(INVALID_KEY_ENV_NAME_FOR_THIS_TEST));
    let request = ChatCompletionRequest {
        model: provider.model().to_string(),
        messages: vec![ChatMessage::user("This call should fail due to invalid key.")],
        response_format: None,
        temperature: None,
        max_tokens: None,
        stream: false,
    };

    let result = provider.call_chat_completion(request).await;
    assert!(
        matches!(result, Err(ApiConnectionError::ApiError { .. })),
        "Expected ApiError, got {:?}",
        result
    );
    if let Err(ApiConnectionError::ApiError { status, .. }) = result {
        assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
    }

    unsafe {
        std::env::remove_var(INVALID_KEY_ENV_NAME_FOR_THIS_TEST);
    }
}
