//! Mentor service facade.
//!
//! Wraps every AI task behind one handle that callers (the session machine and the
//! CLI) share. All operations return a usable answer together with the tier that
//! produced it.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::intent::{IntentClassifier, ParsedIntent};
use crate::orchestrator::{FallbackOrchestrator, TaskOutcome, Tier};
use crate::providers::{
    GeminiClient, GroqClient, HttpImageLoader, ImageData, ImageLoader, ProviderClient,
};
use crate::tasks::{
    ChatContext, ChatTurn, Diagnosis, DiagnosisContext, FailureDiagnosisTask, FoodSafetyReport,
    FoodSafetyTask, LiveFeedback, LiveFeedbackTask, LiveStepContext, MentorChatTask, StepTipTask,
};

/// A structured answer tagged with the tier that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mentored<T> {
    #[serde(flatten)]
    pub value: T,
    pub provider_used: String,
    /// Set when only the terminal tier answered.
    #[serde(skip)]
    pub degraded: bool,
}

impl<T> From<TaskOutcome<T>> for Mentored<T> {
    fn from(outcome: TaskOutcome<T>) -> Self {
        Self {
            degraded: outcome.is_degraded(),
            provider_used: outcome.provider_used.to_string(),
            value: outcome.value,
        }
    }
}

/// Tip for a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Guidance {
    pub tip: String,
    pub provider_used: String,
}

/// Mentor reply in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub provider_used: String,
}

/// Shared entry point for the AI tasks.
#[derive(Clone)]
pub struct MentorService {
    orchestrator: FallbackOrchestrator,
    intents: IntentClassifier,
    images: Arc<dyn ImageLoader>,
}

impl MentorService {
    pub fn new(orchestrator: FallbackOrchestrator, images: Arc<dyn ImageLoader>) -> Self {
        Self {
            intents: IntentClassifier::new(orchestrator.clone()),
            orchestrator,
            images,
        }
    }

    /// Build the provider chain from configuration: Gemini first, then Groq.
    ///
    /// Providers without an API key are left out. With none configured every call
    /// serves its terminal answer.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let timeout = Duration::from_millis(config.request.tier_timeout_ms);
        let mut providers: Vec<Arc<dyn ProviderClient>> = Vec::new();

        if config.gemini.is_enabled() {
            let client = GeminiClient::new(&config.gemini, &config.request).map_err(|e| {
                AppError::Config {
                    message: format!("Failed to create Gemini client: {}", e),
                }
            })?;
            providers.push(Arc::new(client));
        }

        if config.groq.is_enabled() {
            let client = GroqClient::new(&config.groq, &config.request).map_err(|e| {
                AppError::Config {
                    message: format!("Failed to create Groq client: {}", e),
                }
            })?;
            providers.push(Arc::new(client));
        }

        if providers.is_empty() {
            warn!("No AI provider configured, serving fallback answers only");
        } else {
            info!(
                providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
                tier_timeout_ms = config.request.tier_timeout_ms,
                "AI provider chain ready"
            );
        }

        let images = HttpImageLoader::new(config.request.image_fetch_timeout_ms)
            .map_err(|e| AppError::Config {
                message: format!("Failed to create image loader: {}", e),
            })?
            .with_max_bytes(config.request.max_image_bytes);

        Ok(Self::new(
            FallbackOrchestrator::with_providers(providers, timeout),
            Arc::new(images),
        ))
    }

    /// The orchestrator shared by all tasks.
    pub fn orchestrator(&self) -> &FallbackOrchestrator {
        &self.orchestrator
    }

    /// Mentoring tip for a step instruction.
    pub async fn get_guidance(&self, step_instruction: &str) -> Guidance {
        let outcome = self
            .orchestrator
            .execute(&StepTipTask::new(step_instruction))
            .await;
        Guidance {
            tip: outcome.value,
            provider_used: outcome.provider_used.to_string(),
        }
    }

    /// Classify a voice command.
    pub async fn parse_intent(&self, text: &str) -> Mentored<ParsedIntent> {
        self.intents.classify(text).await.into()
    }

    /// Food safety review of an instruction.
    pub async fn check_food_safety(&self, instruction: &str) -> Mentored<FoodSafetyReport> {
        self.orchestrator
            .execute(&FoodSafetyTask::new(instruction))
            .await
            .into()
    }

    /// Diagnose a failed dish from an uploaded photo and optional context.
    ///
    /// The photo is only fetched when some tier accepts images. A photo that cannot
    /// be loaded does not fail the call: every tier then gets the context-only prompt.
    pub async fn diagnose_failure(
        &self,
        image_url: &str,
        context: Option<&DiagnosisContext>,
    ) -> Mentored<Diagnosis> {
        let image = if self.orchestrator.tiers().iter().any(Tier::supports_vision) {
            match self.images.load(image_url).await {
                Ok(image) => {
                    debug!(bytes = image.bytes.len(), mime = %image.mime_type, "Loaded failure photo");
                    Some(Arc::new(image))
                }
                Err(e) => {
                    warn!(image_url, error = %e, "Failure photo unavailable, diagnosing from context");
                    None
                }
            }
        } else {
            debug!(image_url, "No vision-capable tier, skipping failure photo");
            None
        };

        self.orchestrator
            .execute(&FailureDiagnosisTask::new(context, image))
            .await
            .into()
    }

    /// Conversational reply to the cook.
    pub async fn chat(&self, turns: &[ChatTurn], context: &ChatContext) -> ChatReply {
        let outcome = self
            .orchestrator
            .execute(&MentorChatTask::new(turns, context))
            .await;
        ChatReply {
            reply: outcome.value,
            provider_used: outcome.provider_used.to_string(),
        }
    }

    /// Progress check on a camera frame.
    pub async fn live_feedback(
        &self,
        frame: ImageData,
        step: &LiveStepContext,
    ) -> Mentored<LiveFeedback> {
        self.orchestrator
            .execute(&LiveFeedbackTask::new(Arc::new(frame), step))
            .await
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::intent::{Intent, RULES_TIER};
    use crate::orchestrator::TERMINAL_TIER;
    use crate::providers::{MockImageLoader, MockProviderClient};
    use crate::tasks::{Severity, FALLBACK_CHAT_REPLY, FALLBACK_TIP};
    use std::sync::Mutex;

    fn provider(
        name: &'static str,
        vision: bool,
        reply: Result<&'static str, ()>,
    ) -> (Arc<dyn ProviderClient>, Arc<Mutex<Vec<bool>>>) {
        let seen_images = Arc::new(Mutex::new(Vec::new()));
        let seen = seen_images.clone();
        let mut provider = MockProviderClient::new();
        provider.expect_name().return_const(name);
        provider.expect_supports_vision().return_const(vision);
        provider.expect_generate().returning(move |request| {
            seen.lock().unwrap().push(request.image.is_some());
            match reply {
                Ok(text) => Ok(text.to_string()),
                Err(()) => Err(ProviderError::Api {
                    status: 503,
                    message: "overloaded".to_string(),
                }),
            }
        });
        (Arc::new(provider), seen_images)
    }

    fn loader(result: Result<(), ()>) -> Arc<dyn ImageLoader> {
        let mut loader = MockImageLoader::new();
        loader.expect_load().returning(move |_| match result {
            Ok(()) => Ok(ImageData::new(vec![0xff, 0xd8, 0xff], "image/jpeg")),
            Err(()) => Err(ProviderError::Image {
                message: "404".to_string(),
            }),
        });
        Arc::new(loader)
    }

    fn service(providers: Vec<Arc<dyn ProviderClient>>, images: Arc<dyn ImageLoader>) -> MentorService {
        MentorService::new(
            FallbackOrchestrator::with_providers(providers, Duration::from_secs(1)),
            images,
        )
    }

    const DIAGNOSIS_JSON: &str = r#"{"root_cause": "Burnt", "explanation": "Heat too high.",
        "tips": ["Lower heat"], "severity": "minor", "confidence": 0.9}"#;

    #[tokio::test]
    async fn test_guidance_from_first_provider() {
        let (gemini, _) = provider("gemini", true, Ok("  Listen for a gentle sizzle.  "));
        let mentor = service(vec![gemini], loader(Ok(())));

        let guidance = mentor.get_guidance("Sear the steak").await;
        assert_eq!(guidance.tip, "Listen for a gentle sizzle.");
        assert_eq!(guidance.provider_used, "gemini");
    }

    #[tokio::test]
    async fn test_guidance_fallback_without_providers() {
        let mentor = service(Vec::new(), loader(Ok(())));
        let guidance = mentor.get_guidance("Sear the steak").await;
        assert_eq!(guidance.tip, FALLBACK_TIP);
        assert_eq!(guidance.provider_used, TERMINAL_TIER);
    }

    #[tokio::test]
    async fn test_parse_intent_uses_rules_when_offline() {
        let (gemini, _) = provider("gemini", true, Err(()));
        let mentor = service(vec![gemini], loader(Ok(())));

        let reply = mentor.parse_intent("go back").await;
        assert_eq!(reply.value.intent, Intent::Prev);
        assert_eq!(reply.provider_used, RULES_TIER);
        assert!(reply.degraded);
    }

    #[tokio::test]
    async fn test_food_safety_second_tier() {
        let (gemini, _) = provider("gemini", true, Ok("I think it's fine"));
        let (groq, _) = provider(
            "groq",
            false,
            Ok(r#"{"safe": false, "warnings": ["Cook chicken to 74C"]}"#),
        );
        let mentor = service(vec![gemini, groq], loader(Ok(())));

        let reply = mentor.check_food_safety("Serve the chicken pink").await;
        assert!(!reply.value.safe);
        assert_eq!(reply.value.warnings, vec!["Cook chicken to 74C".to_string()]);
        assert_eq!(reply.provider_used, "groq");
    }

    #[tokio::test]
    async fn test_diagnosis_sends_photo_to_vision_provider() {
        let (gemini, seen) = provider("gemini", true, Ok(DIAGNOSIS_JSON));
        let mentor = service(vec![gemini], loader(Ok(())));

        let reply = mentor.diagnose_failure("https://cdn/burnt.jpg", None).await;
        assert_eq!(reply.value.severity, Severity::Minor);
        assert_eq!(reply.provider_used, "gemini");
        assert_eq!(*seen.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn test_diagnosis_without_photo_uses_context_prompt() {
        let (gemini, seen) = provider("gemini", true, Ok(DIAGNOSIS_JSON));
        let mentor = service(vec![gemini], loader(Err(())));

        let context = DiagnosisContext {
            heat_level: Some("high".to_string()),
            ..Default::default()
        };
        let reply = mentor
            .diagnose_failure("https://cdn/missing.jpg", Some(&context))
            .await;
        assert_eq!(reply.provider_used, "gemini");
        assert_eq!(*seen.lock().unwrap(), vec![false]);
    }

    fn untouched_loader() -> Arc<dyn ImageLoader> {
        let mut loader = MockImageLoader::new();
        loader.expect_load().never();
        Arc::new(loader)
    }

    #[tokio::test]
    async fn test_diagnosis_offline_skips_photo_fetch() {
        let mentor = service(Vec::new(), untouched_loader());

        let reply = mentor.diagnose_failure("https://cdn/burnt.jpg", None).await;
        assert_eq!(reply.value, FailureDiagnosisTask::fallback_diagnosis());
        assert_eq!(reply.provider_used, TERMINAL_TIER);
    }

    #[tokio::test]
    async fn test_diagnosis_text_only_chain_skips_photo_fetch() {
        let (groq, seen) = provider("groq", false, Ok(DIAGNOSIS_JSON));
        let mentor = service(vec![groq], untouched_loader());

        let reply = mentor.diagnose_failure("https://cdn/burnt.jpg", None).await;
        assert_eq!(reply.provider_used, "groq");
        assert_eq!(*seen.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn test_diagnosis_terminal() {
        let (gemini, _) = provider("gemini", true, Ok("{\"severity\": \"catastrophic\"}"));
        let mentor = service(vec![gemini], loader(Ok(())));

        let reply = mentor.diagnose_failure("https://cdn/x.jpg", None).await;
        assert_eq!(reply.value, FailureDiagnosisTask::fallback_diagnosis());
        assert_eq!(reply.provider_used, TERMINAL_TIER);
    }

    #[tokio::test]
    async fn test_chat_fallback_reply() {
        let (groq, _) = provider("groq", false, Err(()));
        let mentor = service(vec![groq], loader(Ok(())));

        let reply = mentor
            .chat(&[ChatTurn::user("Is my roux ready?")], &ChatContext::default())
            .await;
        assert_eq!(reply.reply, FALLBACK_CHAT_REPLY);
        assert_eq!(reply.provider_used, TERMINAL_TIER);
    }

    #[tokio::test]
    async fn test_live_feedback_skips_text_only_provider() {
        let mut groq = MockProviderClient::new();
        groq.expect_name().return_const("groq");
        groq.expect_supports_vision().return_const(false);
        groq.expect_generate().never();

        let mentor = service(vec![Arc::new(groq)], loader(Ok(())));
        let step = LiveStepContext {
            recipe_name: "Risotto".to_string(),
            step_number: 2,
            step_instruction: "Toast the rice".to_string(),
        };

        let reply = mentor
            .live_feedback(ImageData::new(vec![1, 2, 3], "image/png"), &step)
            .await;
        assert!(reply.value.is_on_track);
        assert_eq!(reply.provider_used, TERMINAL_TIER);
    }

    #[test]
    fn test_mentored_serializes_flat() {
        let reply = Mentored {
            value: FoodSafetyReport {
                safe: true,
                warnings: Vec::new(),
            },
            provider_used: "gemini".to_string(),
            degraded: false,
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"safe": true, "warnings": [], "provider_used": "gemini"})
        );
    }
}
