//! Ordered provider failover.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderFailure, SynthesisError};
use crate::git::ChangeSet;
use crate::length::Length;
use crate::stats::Statistics;

use super::prompt::build_prompt;
use super::provider::{Backend, Prompt, Provider, ProviderKind, ProviderSpec};
use super::retry::{RetryExhausted, RetryPolicy, retry_with_backoff};
use super::sections::{Narrative, NarrativeSections, parse_sections};

/// What the gateway needs to produce a narrative.
pub struct SynthesisRequest<'a> {
    pub statistics: &'a Statistics,
    pub changeset: &'a ChangeSet,
    pub length: Length,
}

/// A successful synthesis with the failures that preceded it.
#[derive(Debug)]
pub struct Synthesis {
    pub sections: NarrativeSections,
    pub provider: ProviderKind,
    pub model: String,
    pub failures: Vec<ProviderFailure>,
}

impl Synthesis {
    pub fn into_narrative(self) -> Narrative {
        Narrative::Available {
            provider: self.provider.to_string(),
            model: self.model,
            sections: self.sections,
        }
    }
}

/// Tries each backend in order until one yields a usable narrative.
pub struct Gateway {
    backends: Vec<Box<dyn Backend>>,
    policy: RetryPolicy,
}

impl Gateway {
    /// A gateway over `backends`, tried in the given order.
    pub fn new(backends: Vec<Box<dyn Backend>>) -> Self {
        Self {
            backends,
            policy: RetryPolicy::default(),
        }
    }

    /// Build concrete providers from specs, ordered by ascending priority.
    pub fn from_specs(specs: &[ProviderSpec]) -> Self {
        let mut ordered: Vec<&ProviderSpec> = specs.iter().collect();
        ordered.sort_by_key(|spec| spec.priority);
        let backends = ordered
            .into_iter()
            .map(|spec| Box::new(Provider::from_spec(spec)) as Box<dyn Backend>)
            .collect();
        Self::new(backends)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn providers(&self) -> Vec<ProviderKind> {
        self.backends.iter().map(|b| b.kind()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Build the prompt for `request` and synthesize a narrative.
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        deadline: Instant,
    ) -> Result<Synthesis, SynthesisError> {
        let prompt = build_prompt(request.statistics, request.changeset, request.length)
            .map_err(SynthesisError::Prompt)?;
        self.generate(&prompt, request.length, deadline).await
    }

    /// Send `prompt` down the chain.
    ///
    /// Each backend gets its own retry budget. A response that lacks the
    /// sections required for `length` counts as a transient failure. Once
    /// the deadline passes no further backend is tried.
    pub async fn generate(
        &self,
        prompt: &Prompt,
        length: Length,
        deadline: Instant,
    ) -> Result<Synthesis, SynthesisError> {
        let mut failures = Vec::new();

        for backend in &self.backends {
            let provider = backend.kind();
            let model = backend.model();

            if Instant::now() >= deadline {
                return Err(SynthesisError::DeadlineExceeded { failures });
            }

            debug!("Requesting narrative from {} ({})", provider, model);
            let outcome = retry_with_backoff(&self.policy, deadline, || async move {
                let raw = backend.generate(prompt).await?;
                parse_sections(&raw, length)
            })
            .await;

            match outcome {
                Ok(sections) => {
                    if !failures.is_empty() {
                        info!("Narrative produced by fallback provider {}", provider);
                    }
                    return Ok(Synthesis {
                        sections,
                        provider,
                        model,
                        failures,
                    });
                }
                Err(RetryExhausted { error, attempts }) => {
                    let deadline_hit = matches!(error, ProviderError::DeadlineExceeded);
                    let failure = ProviderFailure {
                        provider,
                        model,
                        attempts,
                        error,
                    };
                    warn!("Provider failed: {}", failure);
                    failures.push(failure);

                    if deadline_hit {
                        return Err(SynthesisError::DeadlineExceeded { failures });
                    }
                }
            }
        }

        Err(SynthesisError::Unavailable { failures })
    }
}
