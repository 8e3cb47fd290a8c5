//! One report run from history to artifact.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::error::{GitError, RenderError, RunError, SynthesisError};
use crate::git::{
    ChangeSet, HistoryQuery, TimeWindow, fetch_history, open_repository, resolve_window,
};
use crate::length::Length;
use crate::llm::{Gateway, Narrative, SynthesisRequest};
use crate::report::{Artifact, Format, render};
use crate::stats::{Statistics, aggregate, aggregate_with_prior};
use crate::telemetry::{TracingTracker, UsageEvent, UsageTracker, commit_bucket, emit};

/// Longest deadline a run is given; larger timeouts are clamped to it.
pub const MAX_RUN_TIMEOUT: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Parameters of one run.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub repo: PathBuf,
    pub since: Option<String>,
    pub until: Option<String>,
    pub author: Option<String>,
    pub include_merges: bool,
    /// Also extract the preceding window of equal length and compute deltas.
    pub compare: bool,
    pub format: Format,
    pub length: Length,
    pub timeout: Duration,
}

impl ReportRequest {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            since: None,
            until: None,
            author: None,
            include_merges: false,
            compare: false,
            format: Format::default(),
            length: Length::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Collaborators shared by runs.
#[derive(Clone)]
pub struct RunContext {
    pub tracker: Arc<dyn UsageTracker>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            tracker: Arc::new(TracingTracker),
        }
    }
}

/// The result of a successful run.
#[derive(Debug)]
pub struct ReportOutcome {
    pub artifact: Artifact,
    /// Format actually delivered, which differs from the requested one
    /// when PDF conversion fell back to HTML.
    pub format: Format,
    pub statistics: Statistics,
    pub narrative: Narrative,
    pub warnings: Vec<String>,
}

/// Run extraction, aggregation, synthesis, and rendering under one deadline.
///
/// A usage event is emitted whether or not the run succeeds.
pub async fn run_report(
    ctx: &RunContext,
    request: &ReportRequest,
    gateway: &Gateway,
) -> Result<ReportOutcome, RunError> {
    let started = std::time::Instant::now();
    let result = execute(request, gateway).await;

    let mut event = UsageEvent::new("report", started.elapsed(), request.format, request.length);
    if let Ok(outcome) = &result {
        event.success = true;
        event.commit_bucket = commit_bucket(outcome.statistics.commit_count);
        if let Narrative::Available { provider, .. } = &outcome.narrative {
            event.provider = Some(provider.clone());
        }
    }
    emit(ctx.tracker.clone(), event);

    result
}

async fn execute(request: &ReportRequest, gateway: &Gateway) -> Result<ReportOutcome, RunError> {
    let deadline = run_deadline(request.timeout);
    let window = resolve_window(request.since.as_deref(), request.until.as_deref(), Utc::now())?;
    info!(
        "Reporting on {} to {}",
        window.since.to_rfc3339(),
        window.until.to_rfc3339()
    );

    let (current, prior) = extract(request, window, deadline).await?;
    let statistics = match &prior {
        Some(prior) => aggregate_with_prior(&current, prior),
        None => aggregate(&current),
    };
    debug!(
        "Aggregated {} commits across {} files",
        statistics.commit_count, statistics.file_count
    );

    let mut warnings: Vec<String> = current
        .warnings
        .iter()
        .map(|w| format!("commit {}: {}", w.commit, w.message))
        .collect();

    let narrative = synthesize(
        gateway,
        &statistics,
        &current,
        request.length,
        deadline,
        &mut warnings,
    )
    .await;

    let rendered = render(&statistics, &narrative, request.format, request.length);
    let (artifact, format) = deliverable(rendered, request.format, &mut warnings)?;

    Ok(ReportOutcome {
        artifact,
        format,
        statistics,
        narrative,
        warnings,
    })
}

/// Accept a rendered artifact, or fall back to the HTML stage when only the
/// print conversion failed.
fn deliverable(
    rendered: Result<Artifact, RenderError>,
    requested: Format,
    warnings: &mut Vec<String>,
) -> Result<(Artifact, Format), RunError> {
    match rendered {
        Ok(artifact) => Ok((artifact, requested)),
        Err(RenderError::PrintConversion { reason, markup }) => {
            warn!("PDF conversion failed ({}); delivering HTML instead", reason);
            warnings.push(format!("PDF conversion failed: {}; delivered HTML", reason));
            Ok((Artifact::Text(markup), Format::Html))
        }
        Err(e) => Err(e.into()),
    }
}

/// Deadline for a run of `timeout`, capped so huge values cannot overflow.
fn run_deadline(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout.min(MAX_RUN_TIMEOUT))
        .unwrap_or_else(|| now + Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Extract the window, and the preceding one when comparing, on a blocking
/// thread bounded by the run deadline.
async fn extract(
    request: &ReportRequest,
    window: TimeWindow,
    deadline: Instant,
) -> Result<(ChangeSet, Option<ChangeSet>), RunError> {
    let repo_path = request.repo.clone();
    let mut query = HistoryQuery::new(window);
    query.author = request.author.clone();
    query.include_merges = request.include_merges;
    query.deadline = Some(deadline.into_std());
    let compare = request.compare;

    let handle = task::spawn_blocking(move || {
        let repo = open_repository(&repo_path)?;
        let current = fetch_history(&repo, &query)?;
        let prior = if compare {
            let prior_query = HistoryQuery {
                window: query.window.preceding(),
                ..query.clone()
            };
            Some(fetch_history(&repo, &prior_query)?)
        } else {
            None
        };
        Ok::<_, GitError>((current, prior))
    });

    match timeout_at(deadline, handle).await {
        Err(_) => Err(RunError::DeadlineExceeded(request.timeout.as_secs())),
        Ok(Err(join)) => Err(RunError::Join(join)),
        Ok(Ok(Err(GitError::DeadlineExceeded))) => {
            Err(RunError::DeadlineExceeded(request.timeout.as_secs()))
        }
        Ok(Ok(result)) => Ok(result?),
    }
}

async fn synthesize(
    gateway: &Gateway,
    statistics: &Statistics,
    changeset: &ChangeSet,
    length: Length,
    deadline: Instant,
    warnings: &mut Vec<String>,
) -> Narrative {
    let request = SynthesisRequest {
        statistics,
        changeset,
        length,
    };

    match gateway.synthesize(&request, deadline).await {
        Ok(synthesis) => {
            for failure in &synthesis.failures {
                warnings.push(format!("provider skipped: {}", failure));
            }
            synthesis.into_narrative()
        }
        Err(e) => {
            warn!("{}", e);
            let reason = match &e {
                SynthesisError::Unavailable { failures } if failures.is_empty() => {
                    "no AI providers configured".to_string()
                }
                SynthesisError::Unavailable { failures } => failures
                    .iter()
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
                SynthesisError::DeadlineExceeded { .. } => {
                    "the run deadline was reached before a provider answered".to_string()
                }
                SynthesisError::Prompt(_) => "the prompt could not be assembled".to_string(),
            };
            warnings.push(e.to_string());
            Narrative::Unavailable { reason }
        }
    }
}
