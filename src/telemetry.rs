//! Usage events emitted after each run.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;

use crate::length::Length;
use crate::report::Format;

/// One completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageEvent {
    pub command: String,
    pub duration_ms: u64,
    pub success: bool,
    pub format: Format,
    pub length: Length,
    /// Provider that wrote the narrative, if any.
    pub provider: Option<String>,
    pub commit_bucket: &'static str,
}

impl UsageEvent {
    pub fn new(command: &str, duration: Duration, format: Format, length: Length) -> Self {
        Self {
            command: command.to_string(),
            duration_ms: duration.as_millis() as u64,
            success: false,
            format,
            length,
            provider: None,
            commit_bucket: commit_bucket(0),
        }
    }
}

/// Coarse commit-count bucket so events never carry exact repository sizes.
pub fn commit_bucket(count: usize) -> &'static str {
    match count {
        0 => "0",
        1..=10 => "1-10",
        11..=50 => "11-50",
        51..=200 => "51-200",
        _ => "201+",
    }
}

/// Receiver of usage events.
pub trait UsageTracker: Send + Sync {
    fn record(&self, event: UsageEvent);
}

/// Writes events to the `chronicle::usage` tracing target.
#[derive(Debug, Default)]
pub struct TracingTracker;

impl UsageTracker for TracingTracker {
    fn record(&self, event: UsageEvent) {
        info!(
            target: "chronicle::usage",
            command = %event.command,
            duration_ms = event.duration_ms,
            success = event.success,
            format = %event.format,
            length = %event.length,
            provider = event.provider.as_deref().unwrap_or("none"),
            commits = event.commit_bucket,
            "run finished"
        );
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    events: Mutex<Vec<UsageEvent>>,
}

impl MemoryTracker {
    pub fn events(&self) -> Vec<UsageEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl UsageTracker for MemoryTracker {
    fn record(&self, event: UsageEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Hand `event` to `tracker` on a spawned task.
pub fn emit(tracker: Arc<dyn UsageTracker>, event: UsageEvent) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracker.record(event);
    })
}
