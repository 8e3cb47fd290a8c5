//! Provider identities, configuration, and the backend capability.

use std::env;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

use super::anthropic::AnthropicClient;
use super::claude_code::ClaudeCodeClient;
use super::gemini::GeminiClient;
use super::ollama::OllamaClient;
use super::openai::OpenAiClient;

/// Supported AI backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
    Ollama,
    ClaudeCode,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Ollama => "Ollama",
            ProviderKind::ClaudeCode => "Claude Code",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-sonnet-4-5",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::Ollama => "llama3.1",
            ProviderKind::ClaudeCode => "sonnet",
        }
    }

    /// Environment variable holding the API key, for providers that need one.
    pub fn default_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::Ollama | ProviderKind::ClaudeCode => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "open_ai" | "gpt" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            "claude_code" | "claude_cli" => Ok(Self::ClaudeCode),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// One entry of the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    pub model: String,
    /// Name of the environment variable holding the credential.
    pub api_key_env: Option<String>,
    /// Lower ranks are tried first.
    pub priority: u32,
    pub base_url: Option<String>,
}

impl ProviderSpec {
    /// A spec with the provider's default model and credential variable.
    pub fn new(kind: ProviderKind, priority: u32) -> Self {
        Self {
            kind,
            model: kind.default_model().to_string(),
            api_key_env: kind.default_key_env().map(str::to_string),
            priority,
            base_url: None,
        }
    }
}

/// Generation parameters derived from the requested report length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A provider-agnostic request.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub params: GenerationParams,
}

/// The capability every AI backend provides.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn model(&self) -> String;

    /// Send the prompt and return the raw completion text.
    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError>;
}

/// The closed set of concrete backends.
pub enum Provider {
    Anthropic(AnthropicClient),
    OpenAi(OpenAiClient),
    Gemini(GeminiClient),
    Ollama(OllamaClient),
    ClaudeCode(ClaudeCodeClient),
}

impl Provider {
    /// Build a backend from its spec, resolving the credential from the
    /// environment. A missing credential surfaces on the first call.
    pub fn from_spec(spec: &ProviderSpec) -> Self {
        let api_key = spec
            .api_key_env
            .as_deref()
            .and_then(|var| env::var(var).ok())
            .filter(|key| !key.trim().is_empty());
        let key_env = spec
            .api_key_env
            .clone()
            .unwrap_or_else(|| "API key".to_string());
        let model = spec.model.clone();
        let base_url = spec.base_url.clone();

        match spec.kind {
            ProviderKind::Anthropic => {
                Provider::Anthropic(AnthropicClient::new(model, api_key, key_env, base_url))
            }
            ProviderKind::OpenAi => {
                Provider::OpenAi(OpenAiClient::new(model, api_key, key_env, base_url))
            }
            ProviderKind::Gemini => {
                Provider::Gemini(GeminiClient::new(model, api_key, key_env, base_url))
            }
            ProviderKind::Ollama => Provider::Ollama(OllamaClient::new(model, base_url)),
            ProviderKind::ClaudeCode => Provider::ClaudeCode(ClaudeCodeClient::new(model)),
        }
    }
}

#[async_trait]
impl Backend for Provider {
    fn kind(&self) -> ProviderKind {
        match self {
            Provider::Anthropic(_) => ProviderKind::Anthropic,
            Provider::OpenAi(_) => ProviderKind::OpenAi,
            Provider::Gemini(_) => ProviderKind::Gemini,
            Provider::Ollama(_) => ProviderKind::Ollama,
            Provider::ClaudeCode(_) => ProviderKind::ClaudeCode,
        }
    }

    fn model(&self) -> String {
        match self {
            Provider::Anthropic(c) => c.model().to_string(),
            Provider::OpenAi(c) => c.model().to_string(),
            Provider::Gemini(c) => c.model().to_string(),
            Provider::Ollama(c) => c.model().to_string(),
            Provider::ClaudeCode(c) => c.model().to_string(),
        }
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        match self {
            Provider::Anthropic(c) => c.generate(prompt).await,
            Provider::OpenAi(c) => c.generate(prompt).await,
            Provider::Gemini(c) => c.generate(prompt).await,
            Provider::Ollama(c) => c.generate(prompt).await,
            Provider::ClaudeCode(c) => c.generate(prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str_aliases() {
        assert_eq!("anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("claude-code".parse::<ProviderKind>().unwrap(), ProviderKind::ClaudeCode);
        assert!("mystery".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(serde_json::to_string(&ProviderKind::OpenAi).unwrap(), "\"openai\"");
        assert_eq!(
            serde_json::from_str::<ProviderKind>("\"claude_code\"").unwrap(),
            ProviderKind::ClaudeCode
        );
    }

    #[test]
    fn test_spec_defaults() {
        let spec = ProviderSpec::new(ProviderKind::Gemini, 3);
        assert_eq!(spec.model, "gemini-2.0-flash");
        assert_eq!(spec.api_key_env.as_deref(), Some("GEMINI_API_KEY"));
        assert_eq!(spec.priority, 3);

        let local = ProviderSpec::new(ProviderKind::Ollama, 1);
        assert_eq!(local.api_key_env, None);
    }

    #[test]
    fn test_from_spec_resolves_credential_from_env() {
        temp_env::with_var("CHRONICLE_TEST_KEY", Some("secret"), || {
            let mut spec = ProviderSpec::new(ProviderKind::Anthropic, 1);
            spec.api_key_env = Some("CHRONICLE_TEST_KEY".to_string());
            let provider = Provider::from_spec(&spec);
            assert_eq!(provider.kind(), ProviderKind::Anthropic);
            match provider {
                Provider::Anthropic(client) => assert!(client.has_credential()),
                _ => panic!("expected Anthropic client"),
            }
        });
    }
}
