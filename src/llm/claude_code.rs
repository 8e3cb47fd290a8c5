//! Claude Code CLI backend.

use std::env;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::warn;

use crate::error::ProviderError;

use super::http::non_empty;
use super::provider::Prompt;

/// Default timeout for one CLI invocation (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Environment variable to override the default timeout.
const TIMEOUT_ENV_VAR: &str = "CHRONICLE_CLAUDE_TIMEOUT";

const DEFAULT_PROGRAM: &str = "claude";

/// Reads `CHRONICLE_CLAUDE_TIMEOUT` (seconds), falling back to 300 with a
/// warning when the value does not parse.
fn get_timeout() -> Duration {
    match env::var(TIMEOUT_ENV_VAR) {
        Ok(v) if !v.is_empty() => match v.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!(
                    "Invalid {} value '{}', using default {}s",
                    TIMEOUT_ENV_VAR, v, DEFAULT_TIMEOUT_SECS
                );
                Duration::from_secs(DEFAULT_TIMEOUT_SECS)
            }
        },
        _ => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    }
}

/// The `--output-format json` result envelope.
#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    is_error: bool,
}

pub struct ClaudeCodeClient {
    program: String,
    model: String,
}

impl ClaudeCodeClient {
    pub fn new(model: String) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            model,
        }
    }

    /// Use a different executable name or path.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        if which::which(&self.program).is_err() {
            return Err(ProviderError::NotInstalled);
        }

        let timeout_duration = get_timeout();
        let full_prompt = format!("{}\n\n{}", prompt.system, prompt.user);

        let output = timeout(
            timeout_duration,
            Command::new(&self.program)
                .arg("-p")
                .arg(&full_prompt)
                .arg("--output-format")
                .arg("json")
                .arg("--model")
                .arg(&self.model)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ProviderError::Timeout(timeout_duration.as_secs()))?
        .map_err(ProviderError::SpawnFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let code = output.status.code().unwrap_or(-1);
            return Err(ProviderError::NonZeroExit { code, stderr });
        }

        parse_envelope(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Unwrap the CLI's JSON envelope into the completion text.
fn parse_envelope(stdout: &str) -> Result<String, ProviderError> {
    let envelope: Envelope = serde_json::from_str(stdout.trim()).map_err(|e| {
        ProviderError::InvalidResponse(format!("CLI output is not a JSON envelope: {}", e))
    })?;

    let result = envelope.result.unwrap_or_default();
    if envelope.is_error {
        return Err(ProviderError::InvalidResponse(format!(
            "CLI reported an error: {}",
            result
        )));
    }

    non_empty(result)
}
