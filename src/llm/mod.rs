//! AI narrative synthesis over an ordered chain of providers.

pub mod anthropic;
pub mod claude_code;
pub mod gateway;
pub mod gemini;
pub mod http;
pub mod json;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod sections;

pub use gateway::{Gateway, Synthesis, SynthesisRequest};
pub use prompt::{build_prompt, sanitize_for_prompt};
pub use provider::{Backend, GenerationParams, Prompt, Provider, ProviderKind, ProviderSpec};
pub use retry::{MAX_ATTEMPTS, RetryPolicy};
pub use sections::{Narrative, NarrativeSections, parse_sections, required_sections};
