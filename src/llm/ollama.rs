//! Local Ollama chat client.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

use super::http::{build_client, endpoint, non_empty, send_json};
use super::provider::Prompt;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    format: &'static str,
    options: Options,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct Options {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    pub fn new(model: String, base_url: Option<String>) -> Self {
        Self {
            http: build_client(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
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
            stream: false,
            format: "json",
            options: Options {
                temperature: prompt.params.temperature,
                num_predict: prompt.params.max_tokens,
            },
        };

        let response: ChatResponse =
            send_json(self.http.post(endpoint(&self.base_url, "api/chat")).json(&body)).await?;

        non_empty(response.message.map(|m| m.content).unwrap_or_default())
    }
}
