//! Anthropic Messages API client.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

use super::http::{build_client, endpoint, non_empty, send_json};
use super::provider::Prompt;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    key_env: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
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

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingCredential(self.key_env.clone()))?;

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: prompt.params.max_tokens,
            temperature: prompt.params.temperature,
            system: &prompt.system,
            messages: [Message {
                role: "user",
                content: &prompt.user,
            }],
        };

        let response: MessagesResponse = send_json(
            self.http
                .post(endpoint(&self.base_url, "v1/messages"))
                .header("x-api-key", api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body),
        )
        .await?;

        let text = response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<String>();

        non_empty(text)
    }
}
