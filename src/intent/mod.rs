//! Voice command classification.
//!
//! [`IntentClassifier`] runs the `voice_intent` task through the provider chain and
//! falls back to the deterministic [`rules`] table, so a command is always classified
//! even with no network connectivity.

pub mod rules;

use serde::{Deserialize, Serialize};

use crate::orchestrator::{
    normalizer, AiTask, FallbackOrchestrator, MalformedOutput, TaskKind, TaskOutcome,
};
use crate::prompts;
use crate::providers::{GenerationRequest, ProviderClient};

/// Timer length used when a TIMER command carries no duration.
pub const DEFAULT_TIMER_SECONDS: u32 = 300;

/// Tag reported when the rule table produced the intent.
pub const RULES_TIER: &str = "rules";

/// Closed set of voice intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Next,
    Prev,
    Repeat,
    Timer,
    Pause,
    Resume,
    Ingredient,
    Help,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Next => "NEXT",
            Intent::Prev => "PREV",
            Intent::Repeat => "REPEAT",
            Intent::Timer => "TIMER",
            Intent::Pause => "PAUSE",
            Intent::Resume => "RESUME",
            Intent::Ingredient => "INGREDIENT",
            Intent::Help => "HELP",
            Intent::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified voice command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedIntent {
    pub intent: Intent,
    /// Set only for [`Intent::Timer`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

impl ParsedIntent {
    /// An intent without parameters.
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            duration_seconds: None,
        }
    }

    /// A TIMER intent.
    pub fn timer(duration_seconds: u32) -> Self {
        Self {
            intent: Intent::Timer,
            duration_seconds: Some(duration_seconds),
        }
    }
}

/// The `voice_intent` task.
pub struct IntentTask<'a> {
    text: &'a str,
}

impl<'a> IntentTask<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }
}

impl AiTask for IntentTask<'_> {
    type Output = ParsedIntent;

    fn kind(&self) -> TaskKind {
        TaskKind::VoiceIntent
    }

    fn request_for(&self, _provider: &dyn ProviderClient) -> Option<GenerationRequest> {
        Some(GenerationRequest::text(
            prompts::voice_intent(self.text),
            100,
            0.0,
        ))
    }

    fn normalize(&self, raw: &str) -> Result<ParsedIntent, MalformedOutput> {
        normalizer::normalize_intent(raw)
    }

    fn terminal(&self) -> ParsedIntent {
        rules::classify(self.text)
    }

    fn terminal_name(&self) -> &'static str {
        RULES_TIER
    }
}

/// Voice command classifier over an injected provider chain.
#[derive(Clone, Default)]
pub struct IntentClassifier {
    orchestrator: FallbackOrchestrator,
}

impl IntentClassifier {
    pub fn new(orchestrator: FallbackOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Classify `text`. Always returns an intent.
    pub async fn classify(&self, text: &str) -> TaskOutcome<ParsedIntent> {
        self.orchestrator.execute(&IntentTask::new(text)).await
    }
}
