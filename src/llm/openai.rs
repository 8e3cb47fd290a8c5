//! OpenAI Chat Completions client.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ProviderError;

use super::http::{build_client, endpoint, non_empty, send_json};
use super::provider::Prompt;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    key_env: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    // Reasoning models reject `max_tokens` and non-default temperatures.
    max_completion_tokens: u32,
    response_format: serde_json::Value,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        model: String,
        api_key: Option<String>,
        key_env: String,
        base_url: Option<String>,
    ) -> Self {
        Self {
            http: build_client(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
            api_key,
            key_env,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingCredential(self.key_env.clone()))?;

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_completion_tokens: prompt.params.max_tokens,
            response_format: json!({ "type": "json_object" }),
        };

        let response: ChatResponse = send_json(
            self.http
                .post(endpoint(&self.base_url, "v1/chat/completions"))
                .bearer_auth(api_key)
                .json(&body),
        )
        .await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        non_empty(text)
    }
}
