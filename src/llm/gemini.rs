//! Google Gemini `generateContent` client.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

use super::http::{build_client, endpoint, non_empty, send_json};
use super::provider::Prompt;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    key_env: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
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

        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: [Part {
                    text: &prompt.system,
                }],
            },
            contents: [Content {
                role: Some("user"),
                parts: [Part { text: &prompt.user }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: prompt.params.max_tokens,
                temperature: prompt.params.temperature,
                response_mime_type: "application/json",
            },
        };

        let path = format!("v1beta/models/{}:generateContent", self.model);
        let response: GenerateResponse = send_json(
            self.http
                .post(endpoint(&self.base_url, &path))
                .header("x-goog-api-key", api_key)
                .json(&body),
        )
        .await?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        non_empty(text)
    }
}
