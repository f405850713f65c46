//! Multi-tier AI fallback orchestration.
//!
//! A [`FallbackOrchestrator`] walks an ordered list of provider [`Tier`]s for one
//! [`AiTask`]. Each tier gets exactly one bounded attempt; the first attempt whose
//! output normalizes cleanly wins. When every tier fails the task's terminal value is
//! returned, so [`FallbackOrchestrator::execute`] always produces a usable result.

pub mod normalizer;

pub use normalizer::MalformedOutput;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::providers::{GenerationRequest, ProviderClient};

/// Tag reported when the terminal tier produced the result.
pub const TERMINAL_TIER: &str = "fallback";

/// The AI tasks routed through the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    StepTip,
    VoiceIntent,
    FoodSafety,
    FailureDiagnosis,
    MentorChat,
    LiveFeedback,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::StepTip => "step_tip",
            TaskKind::VoiceIntent => "voice_intent",
            TaskKind::FoodSafety => "food_safety",
            TaskKind::FailureDiagnosis => "failure_diagnosis",
            TaskKind::MentorChat => "mentor_chat",
            TaskKind::LiveFeedback => "live_feedback",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work the orchestrator can run against any provider.
pub trait AiTask: Send + Sync {
    /// Typed result of the task.
    type Output: Send;

    fn kind(&self) -> TaskKind;

    /// Build the call for `provider`, or `None` if the provider cannot serve this task.
    fn request_for(&self, provider: &dyn ProviderClient) -> Option<GenerationRequest>;

    /// Parse raw provider text into the typed result.
    fn normalize(&self, raw: &str) -> Result<Self::Output, MalformedOutput>;

    /// Always-available result. Must not perform I/O.
    fn terminal(&self) -> Self::Output;

    /// Tag for results produced by [`AiTask::terminal`].
    fn terminal_name(&self) -> &'static str {
        TERMINAL_TIER
    }
}

/// How a single tier attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Timeout,
    Error,
    Malformed,
    /// The provider lacks a capability the task needs; no call was made.
    Skipped,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Timeout => "timeout",
            AttemptOutcome::Error => "error",
            AttemptOutcome::Malformed => "malformed",
            AttemptOutcome::Skipped => "skipped",
        }
    }
}

/// Record of one tier attempt. Lives only for the request that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackAttempt {
    pub tier: &'static str,
    pub outcome: AttemptOutcome,
    pub elapsed: Duration,
    pub detail: Option<String>,
}

/// Result of an orchestrated call.
#[derive(Debug, Clone)]
pub struct TaskOutcome<T> {
    pub value: T,
    /// Tier that produced `value`.
    pub provider_used: &'static str,
    pub attempts: Vec<FallbackAttempt>,
    degraded: bool,
}

impl<T> TaskOutcome<T> {
    /// True when no provider tier succeeded and the terminal value was served.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Map the value, keeping provenance.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TaskOutcome<U> {
        TaskOutcome {
            value: f(self.value),
            provider_used: self.provider_used,
            attempts: self.attempts,
            degraded: self.degraded,
        }
    }
}

/// One provider slot in a fallback chain.
#[derive(Clone)]
pub struct Tier {
    provider: Arc<dyn ProviderClient>,
    timeout: Duration,
}

impl Tier {
    pub fn new(provider: Arc<dyn ProviderClient>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn supports_vision(&self) -> bool {
        self.provider.supports_vision()
    }
}

/// Ordered provider chain with a guaranteed terminal result.
#[derive(Clone, Default)]
pub struct FallbackOrchestrator {
    tiers: Vec<Tier>,
}

impl FallbackOrchestrator {
    /// Create an orchestrator over tiers in priority order.
    pub fn new(tiers: Vec<Tier>) -> Self {
        Self { tiers }
    }

    /// Create an orchestrator where every provider shares one per-tier timeout.
    pub fn with_providers(providers: Vec<Arc<dyn ProviderClient>>, timeout: Duration) -> Self {
        Self::new(
            providers
                .into_iter()
                .map(|p| Tier::new(p, timeout))
                .collect(),
        )
    }

    /// Tiers in priority order.
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Run `task` through the chain. Never fails.
    pub async fn execute<T: AiTask>(&self, task: &T) -> TaskOutcome<T::Output> {
        let kind = task.kind();
        let mut attempts = Vec::with_capacity(self.tiers.len() + 1);

        for tier in &self.tiers {
            let provider = tier.provider.as_ref();
            let name = provider.name();

            let Some(request) = task.request_for(provider) else {
                debug!(task = %kind, provider = name, "Tier skipped: capability missing");
                attempts.push(FallbackAttempt {
                    tier: name,
                    outcome: AttemptOutcome::Skipped,
                    elapsed: Duration::ZERO,
                    detail: None,
                });
                continue;
            };

            let start = Instant::now();
            // On timeout the in-flight call future is dropped here.
            let result = tokio::time::timeout(tier.timeout, provider.generate(request)).await;
            let elapsed = start.elapsed();

            let (outcome, detail) = match result {
                Err(_) => (
                    AttemptOutcome::Timeout,
                    format!("no response within {}ms", tier.timeout.as_millis()),
                ),
                Ok(Err(e)) if e.is_timeout() => (AttemptOutcome::Timeout, e.to_string()),
                Ok(Err(e)) => (AttemptOutcome::Error, e.to_string()),
                Ok(Ok(raw)) => match task.normalize(&raw) {
                    Ok(value) => {
                        info!(
                            task = %kind,
                            provider = name,
                            latency_ms = elapsed.as_millis() as u64,
                            "AI tier succeeded"
                        );
                        attempts.push(FallbackAttempt {
                            tier: name,
                            outcome: AttemptOutcome::Success,
                            elapsed,
                            detail: None,
                        });
                        return TaskOutcome {
                            value,
                            provider_used: name,
                            attempts,
                            degraded: false,
                        };
                    }
                    Err(malformed) => (AttemptOutcome::Malformed, malformed.reason),
                },
            };

            warn!(
                task = %kind,
                provider = name,
                failure = outcome.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                detail = %detail,
                "AI tier failed, falling back"
            );
            attempts.push(FallbackAttempt {
                tier: name,
                outcome,
                elapsed,
                detail: Some(detail),
            });
        }

        let start = Instant::now();
        let value = task.terminal();
        let terminal = task.terminal_name();
        attempts.push(FallbackAttempt {
            tier: terminal,
            outcome: AttemptOutcome::Success,
            elapsed: start.elapsed(),
            detail: None,
        });

        info!(task = %kind, provider = terminal, "Serving terminal fallback");

        TaskOutcome {
            value,
            provider_used: terminal,
            attempts,
            degraded: true,
        }
    }
}
