//! Error types for chronicle modules using thiserror.

use std::path::PathBuf;

use thiserror::Error;

use crate::llm::ProviderKind;

/// Errors from git history extraction.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository: {path}")]
    RepositoryNotFound {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to parse commit: {0}")]
    ParseCommit(#[source] git2::Error),

    #[error("Failed to walk commit history: {0}")]
    RevwalkError(#[source] git2::Error),

    #[error("Commit {hash} has invalid timestamp (seconds={seconds})")]
    InvalidTimestamp { hash: String, seconds: i64 },

    #[error("History extraction exceeded the run deadline")]
    DeadlineExceeded,
}

/// Errors from resolving a reporting time window.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WindowError {
    #[error("Invalid date range: start ({since}) is after end ({until})")]
    InvalidRange { since: String, until: String },

    #[error("Could not parse '{0}' as a date, timestamp, or relative duration")]
    Unparseable(String),

    #[error("Relative duration '{0}' reaches before the start of time")]
    Overflow(String),
}

/// Errors from a single AI provider call.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Rate limited by provider")]
    RateLimited { retry_after: Option<std::time::Duration> },

    #[error("Provider server error (HTTP {status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Provider returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("Authentication rejected (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("Provider rejected the request (HTTP {status}): {body}")]
    InvalidRequest { status: u16, body: String },

    #[error("No credential found: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Claude Code CLI not found. Install with: npm install -g @anthropic-ai/claude-code")]
    NotInstalled,

    #[error("Failed to spawn provider process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Provider CLI exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Run deadline reached before the provider answered")]
    DeadlineExceeded,
}

impl ProviderError {
    /// Whether retrying the same provider may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout(_)
            | ProviderError::RateLimited { .. }
            | ProviderError::ServerError { .. }
            | ProviderError::Transport(_)
            | ProviderError::InvalidResponse(_)
            | ProviderError::NonZeroExit { .. } => true,
            ProviderError::Unauthorized { .. }
            | ProviderError::InvalidRequest { .. }
            | ProviderError::MissingCredential(_)
            | ProviderError::NotInstalled
            | ProviderError::SpawnFailed(_)
            | ProviderError::DeadlineExceeded => false,
        }
    }

    /// Short human-readable label used in failover messages.
    pub fn summary(&self) -> String {
        match self {
            ProviderError::Timeout(secs) => format!("timed out after {}s", secs),
            ProviderError::RateLimited { .. } => "rate limited".to_string(),
            ProviderError::ServerError { status, .. } => format!("server error {}", status),
            ProviderError::Transport(_) => "network failure".to_string(),
            ProviderError::InvalidResponse(_) => "unusable response".to_string(),
            ProviderError::Unauthorized { .. } => "authentication failed".to_string(),
            ProviderError::InvalidRequest { status, .. } => format!("request rejected ({})", status),
            ProviderError::MissingCredential(var) => format!("{} not set", var),
            ProviderError::NotInstalled => "CLI not installed".to_string(),
            ProviderError::SpawnFailed(_) => "failed to start CLI".to_string(),
            ProviderError::NonZeroExit { code, .. } => format!("CLI exited with code {}", code),
            ProviderError::DeadlineExceeded => "deadline reached".to_string(),
        }
    }
}

/// The final failure recorded for one provider in the fallback chain.
#[derive(Debug)]
pub struct ProviderFailure {
    pub provider: ProviderKind,
    pub model: String,
    pub attempts: u32,
    pub error: ProviderError,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) {} after {} attempt{}",
            self.provider,
            self.model,
            self.error.summary(),
            self.attempts,
            if self.attempts == 1 { "" } else { "s" }
        )
    }
}

/// Errors from narrative synthesis as a whole.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Narrative unavailable: {}", describe_failures(.failures))]
    Unavailable { failures: Vec<ProviderFailure> },

    #[error("Narrative synthesis exceeded the run deadline")]
    DeadlineExceeded { failures: Vec<ProviderFailure> },

    #[error("Failed to build synthesis prompt: {0}")]
    Prompt(#[source] std::fmt::Error),
}

impl SynthesisError {
    pub fn failures(&self) -> &[ProviderFailure] {
        match self {
            SynthesisError::Unavailable { failures }
            | SynthesisError::DeadlineExceeded { failures } => failures,
            SynthesisError::Prompt(_) => &[],
        }
    }
}

fn describe_failures(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no AI providers configured".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from report rendering.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to serialize report: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to build styled markup: {0}")]
    Markup(#[source] std::fmt::Error),

    /// The HTML stage succeeded but PDF conversion did not. The markup is
    /// kept so the caller can deliver it instead.
    #[error("Failed to convert report to PDF: {reason}")]
    PrintConversion { reason: String, markup: String },
}

/// Errors from configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in config file: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Errors that abort a whole report run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    History(#[from] GitError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("History extraction task failed: {0}")]
    Join(#[source] tokio::task::JoinError),

    #[error("Report run exceeded its deadline of {0} seconds")]
    DeadlineExceeded(u64),
}
