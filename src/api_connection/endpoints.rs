use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    /// A user turn carrying an image (as a URL or `data:` URL) and a text prompt.
    pub fn user_with_image(image_url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: image_url.into() },
                },
                ContentPart::Text { text: text.into() },
            ]),
        }
    }
}

/// Recursive JSON schema node, enough to describe structured model output.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct JsonSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#enum: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "additionalProperties")]
    pub additional_properties: Option<bool>,
}

impl JsonSchema {
    fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            ..Default::default()
        }
    }

    pub fn string() -> Self {
        Self::of_type("string")
    }

    pub fn number() -> Self {
        Self::of_type("number")
    }

    pub fn integer() -> Self {
        Self::of_type("integer")
    }

    pub fn boolean() -> Self {
        Self::of_type("boolean")
    }

    pub fn string_enum(values: &[&str]) -> Self {
        Self {
            r#enum: Some(values.iter().map(|v| v.to_string()).collect()),
            ..Self::string()
        }
    }

    pub fn array(items: JsonSchema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of_type("array")
        }
    }

    /// Closed object where every listed property is required.
    pub fn object(properties: Vec<(&str, JsonSchema)>) -> Self {
        let required = properties.iter().map(|(name, _)| name.to_string()).collect();
        Self {
            properties: Some(
                properties
                    .into_iter()
                    .map(|(name, schema)| (name.to_string(), schema))
                    .collect(),
            ),
            required: Some(required),
            additional_properties: Some(false),
            ..Self::of_type("object")
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JsonSchemaDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    pub schema: JsonSchema,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<JsonSchemaDefinition>,
}

impl ResponseFormat {
    pub fn json_schema(definition: JsonSchemaDefinition) -> Self {
        Self {
            format_type: "json_schema".to_string(),
            json_schema: Some(definition),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionResponseMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
    pub index: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: Option<u32>,
    pub total_tokens: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionResponse {
    pub id: String,
    #[serde(default)]
    pub object: Option<String>,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    pub usage: Option<ChatCompletionUsage>,
}

// --- Streaming (`stream: true`) payloads, one per SSE `data:` line ---

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChatCompletionDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionChunkChoice {
    #[serde(default)]
    pub delta: ChatCompletionDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamErrorBody {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    pub message: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChatCompletionChunkChoice>,
    #[serde(default)]
    pub error: Option<StreamErrorBody>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_schema_requires_every_property() {
        let schema = JsonSchema::object(vec![
            ("name", JsonSchema::string()),
            ("confidence", JsonSchema::number().range(0.0, 1.0)),
        ]);
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["type"], json!("object"));
        assert_eq!(value["required"], json!(["name", "confidence"]));
        assert_eq!(value["additionalProperties"], json!(false));
        assert_eq!(value["properties"]["confidence"]["maximum"], json!(1.0));
        assert!(value["properties"]["name"].get("minimum").is_none());
    }

    #[test]
    fn test_image_message_serializes_as_parts() {
        let message = ChatMessage::user_with_image("data:image/png;base64,AAAA", "what is this?");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["content"][0]["type"], json!("image_url"));
        assert_eq!(value["content"][0]["image_url"]["url"], json!("data:image/png;base64,AAAA"));
        assert_eq!(value["content"][1], json!({"type": "text", "text": "what is this?"}));

        let plain = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(plain, json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn test_stream_flag_only_sent_when_set() {
        let mut request = ChatCompletionRequest {
            model: "m".to_string(),
            messages: vec![],
            response_format: None,
            temperature: None,
            max_tokens: None,
            stream: false,
        };
        assert!(serde_json::to_value(&request).unwrap().get("stream").is_none());
        request.stream = true;
        assert_eq!(serde_json::to_value(&request).unwrap()["stream"], json!(true));
    }
}
