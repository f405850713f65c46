//! Integration tests for tiered fallback
//!
//! Drives the public task types through chains of misbehaving providers.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chefmentor::error::{ProviderError, ProviderResult};
use chefmentor::intent::{Intent, IntentTask, ParsedIntent, RULES_TIER};
use chefmentor::orchestrator::{AttemptOutcome, FallbackOrchestrator, Tier, TERMINAL_TIER};
use chefmentor::providers::{GenerationRequest, ProviderClient};
use chefmentor::tasks::{
    FailureDiagnosisTask, FoodSafetyTask, Severity, StepTipTask, FALLBACK_TIP,
};

#[derive(Clone, Copy, Debug)]
enum Behavior {
    Reply(&'static str),
    Fail,
    Stall,
}

struct FakeProvider {
    name: &'static str,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports_vision(&self) -> bool {
        false
    }

    async fn generate(&self, _request: GenerationRequest) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Reply(text) => Ok(text.to_string()),
            Behavior::Fail => Err(ProviderError::Api {
                status: 503,
                message: "unavailable".to_string(),
            }),
            Behavior::Stall => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok("too late".to_string())
            }
        }
    }
}

const TIER_TIMEOUT: Duration = Duration::from_millis(50);

fn chain(providers: &[Arc<FakeProvider>]) -> FallbackOrchestrator {
    FallbackOrchestrator::new(
        providers
            .iter()
            .map(|p| Tier::new(p.clone() as Arc<dyn ProviderClient>, TIER_TIMEOUT))
            .collect(),
    )
}

#[tokio::test]
async fn test_every_failure_ordering_reaches_terminal() {
    let failures = [
        Behavior::Fail,
        Behavior::Stall,
        Behavior::Reply(""),
        Behavior::Reply("   \n"),
    ];

    for first in failures {
        for second in failures {
            let primary = FakeProvider::new("primary", first);
            let secondary = FakeProvider::new("secondary", second);
            let orchestrator = chain(&[primary.clone(), secondary.clone()]);

            let outcome = orchestrator.execute(&StepTipTask::new("Dice the onion")).await;

            assert_eq!(outcome.value, FALLBACK_TIP, "{:?} then {:?}", first, second);
            assert_eq!(outcome.provider_used, TERMINAL_TIER);
            assert!(outcome.is_degraded());
            assert_eq!(primary.calls(), 1);
            assert_eq!(secondary.calls(), 1);
            assert_eq!(outcome.attempts.len(), 3);
        }
    }
}

#[tokio::test]
async fn test_attempts_record_failure_class() {
    let primary = FakeProvider::new("primary", Behavior::Stall);
    let secondary = FakeProvider::new("secondary", Behavior::Reply("{not json"));
    let orchestrator = chain(&[primary, secondary]);

    let outcome = orchestrator.execute(&FoodSafetyTask::new("Rest the meat")).await;

    let classes: Vec<AttemptOutcome> = outcome.attempts.iter().map(|a| a.outcome).collect();
    assert_eq!(
        classes,
        vec![
            AttemptOutcome::Timeout,
            AttemptOutcome::Malformed,
            AttemptOutcome::Success
        ]
    );
    assert!(outcome.attempts[0].elapsed < Duration::from_secs(5));
    assert!(outcome.value.safe);
    assert!(outcome.value.warnings.is_empty());
    assert_eq!(outcome.provider_used, TERMINAL_TIER);
}

#[tokio::test]
async fn test_first_success_stops_the_chain() {
    let primary = FakeProvider::new("primary", Behavior::Reply("Let the pan get hot first."));
    let secondary = FakeProvider::new("secondary", Behavior::Reply("unused"));
    let orchestrator = chain(&[primary.clone(), secondary.clone()]);

    let outcome = orchestrator.execute(&StepTipTask::new("Sear")).await;

    assert_eq!(outcome.value, "Let the pan get hot first.");
    assert_eq!(outcome.provider_used, "primary");
    assert!(!outcome.is_degraded());
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test]
async fn test_unknown_severity_falls_through_to_next_tier() {
    let primary = FakeProvider::new(
        "primary",
        Behavior::Reply(
            "```json\n{\"root_cause\": \"Burnt\", \"explanation\": \"x\", \"tips\": [], \
             \"severity\": \"catastrophic\", \"confidence\": 0.5}\n```",
        ),
    );
    let secondary = FakeProvider::new(
        "secondary",
        Behavior::Reply(
            "{\"root_cause\": \"Burnt\", \"explanation\": \"Heat too high.\", \
             \"tips\": [\"Lower heat\"], \"severity\": \"major\", \"confidence\": 0.6}",
        ),
    );
    let orchestrator = chain(&[primary, secondary]);

    let outcome = orchestrator
        .execute(&FailureDiagnosisTask::new(None, None))
        .await;

    assert_eq!(outcome.provider_used, "secondary");
    assert_eq!(outcome.value.severity, Severity::Major);
    assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::Malformed);
}

#[tokio::test]
async fn test_out_of_range_confidence_is_malformed() {
    let primary = FakeProvider::new(
        "primary",
        Behavior::Reply(
            "{\"root_cause\": \"Soggy\", \"explanation\": \"\", \"tips\": [], \
             \"severity\": \"minor\", \"confidence\": 1.5}",
        ),
    );
    let orchestrator = chain(&[primary]);

    let outcome = orchestrator
        .execute(&FailureDiagnosisTask::new(None, None))
        .await;

    assert_eq!(outcome.provider_used, TERMINAL_TIER);
    assert_eq!(outcome.value.root_cause, "Analysis Unavailable");
    assert_eq!(outcome.value.severity, Severity::Moderate);
}

#[tokio::test]
async fn test_intent_terminal_is_rule_table() {
    let primary = FakeProvider::new("primary", Behavior::Reply("{\"intent\": \"DANCE\"}"));
    let orchestrator = chain(&[primary]);

    let outcome = orchestrator
        .execute(&IntentTask::new("set a timer for 5 minutes"))
        .await;
    assert_eq!(outcome.value, ParsedIntent::timer(300));
    assert_eq!(outcome.provider_used, RULES_TIER);

    let outcome = orchestrator.execute(&IntentTask::new("asdfqwer")).await;
    assert_eq!(outcome.value.intent, Intent::Unknown);
}

#[tokio::test]
async fn test_worst_case_latency_is_sum_of_tier_timeouts() {
    let providers: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|name| FakeProvider::new(*name, Behavior::Stall))
        .collect();
    let orchestrator = chain(&providers);

    let start = std::time::Instant::now();
    let outcome = orchestrator.execute(&StepTipTask::new("Wait")).await;
    let elapsed = start.elapsed();

    assert_eq!(outcome.provider_used, TERMINAL_TIER);
    assert!(elapsed >= TIER_TIMEOUT * 3);
    assert!(elapsed < Duration::from_secs(5));
}
