//! chronicle - CLI entry point.

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

use chronicle::config::{Config, prefer_provider};
use chronicle::{
    Artifact, Format, Gateway, Length, ProviderKind, ReportRequest, RunContext, run_report,
};

/// Summarize what a repository accomplished over a period of time.
#[derive(Parser, Debug)]
#[command(name = "chronicle")]
#[command(about = "Turn git history into an AI-written accomplishment report")]
#[command(version)]
struct Cli {
    /// Repository to report on
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Start of the window: RFC 3339, YYYY-MM-DD, or relative ("2 weeks ago")
    #[arg(long)]
    since: Option<String>,

    /// End of the window (defaults to now)
    #[arg(long)]
    until: Option<String>,

    /// Only include commits whose author name or email contains this text
    #[arg(long)]
    author: Option<String>,

    /// Output format: markdown, json, html, or pdf
    #[arg(short, long)]
    format: Option<Format>,

    /// Report length: light, short, or detailed
    #[arg(short, long)]
    length: Option<Length>,

    /// Try this AI provider first
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Compare against the preceding window of equal length
    #[arg(long)]
    compare: bool,

    /// Include merge commits
    #[arg(long)]
    include_merges: bool,

    /// Deadline for the whole run, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Path to a config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let timeout_secs = cli.timeout.unwrap_or(config.defaults.timeout_secs);
    if timeout_secs == 0 {
        bail!("--timeout must be greater than 0");
    }

    let format = cli.format.unwrap_or(config.defaults.format);
    if format == Format::Pdf && cli.output.is_none() && std::io::stdout().is_terminal() {
        bail!("Refusing to write a PDF to the terminal. Use --output <file>.");
    }

    let mut specs = config.provider_specs();
    if let Some(kind) = cli.provider {
        specs = prefer_provider(specs, kind);
    }
    let gateway = Gateway::from_specs(&specs);

    let request = ReportRequest {
        repo: cli.repo,
        since: cli.since.or_else(|| config.defaults.window.clone()),
        until: cli.until,
        author: cli.author,
        include_merges: cli.include_merges || config.defaults.include_merges,
        compare: cli.compare,
        format,
        length: cli.length.unwrap_or(config.defaults.length),
        timeout: Duration::from_secs(timeout_secs),
    };

    let outcome = run_report(&RunContext::default(), &request, &gateway)
        .await
        .context("Failed to generate report")?;

    for warning in &outcome.warnings {
        eprintln!("Warning: {}", warning);
    }
    if outcome.format != request.format {
        eprintln!("Note: delivered {} instead of {}", outcome.format, request.format);
    }

    match cli.output.as_deref() {
        Some(path) => {
            write_atomic(path, &outcome.artifact)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            eprintln!(
                "Wrote {} report ({} commits) to {}",
                outcome.format,
                outcome.statistics.commit_count,
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(outcome.artifact.as_bytes())
                .context("Failed to write report to stdout")?;
            stdout.flush().context("Failed to write report to stdout")?;
        }
    }

    // Let the usage event task run before the runtime shuts down.
    tokio::task::yield_now().await;

    Ok(())
}

/// Write via a temporary file in the target directory, then rename.
fn write_atomic(path: &Path, artifact: &Artifact) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    file.write_all(artifact.as_bytes())
        .context("Failed to write temporary file")?;
    file.persist(path)
        .map_err(|e| e.error)
        .context("Failed to move report into place")?;
    Ok(())
}
