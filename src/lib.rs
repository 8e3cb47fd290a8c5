//! chronicle - turn git history into an AI-written accomplishment report.
//!
//! # Overview
//!
//! A run extracts the commits of a time window from a local repository,
//! aggregates them into deterministic statistics, asks an ordered chain of
//! AI providers for a narrative, and renders both into Markdown, JSON, HTML,
//! or PDF. When no provider answers, the report is still produced with a
//! placeholder in place of the narrative.

pub mod config;
pub mod error;
pub mod git;
pub mod length;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{
    ConfigError, GitError, ProviderError, RenderError, RunError, SynthesisError, WindowError,
};
pub use git::{ChangeSet, Commit, TimeWindow};
pub use length::Length;
pub use llm::{Gateway, Narrative, ProviderKind, ProviderSpec};
pub use pipeline::{ReportOutcome, ReportRequest, RunContext, run_report};
pub use report::{Artifact, Format, render};
pub use stats::{Category, Statistics};
