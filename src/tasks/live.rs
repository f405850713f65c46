use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::orchestrator::{normalizer, AiTask, MalformedOutput, TaskKind};
use crate::prompts;
use crate::providers::{GenerationRequest, ImageData, ProviderClient};

/// Feedback on a live camera frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveFeedback {
    pub feedback: String,
    pub is_on_track: bool,
    pub suggestions: Vec<String>,
}

/// The step the frame was captured at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStepContext {
    pub recipe_name: String,
    pub step_number: u32,
    pub step_instruction: String,
}

/// Progress check of a camera frame. Only vision-capable providers are tried.
pub struct LiveFeedbackTask {
    prompt: String,
    frame: Arc<ImageData>,
}

impl LiveFeedbackTask {
    pub fn new(frame: Arc<ImageData>, step: &LiveStepContext) -> Self {
        Self {
            prompt: prompts::live_feedback(&step.recipe_name, step.step_number, &step.step_instruction),
            frame,
        }
    }
}

impl AiTask for LiveFeedbackTask {
    type Output = LiveFeedback;

    fn kind(&self) -> TaskKind {
        TaskKind::LiveFeedback
    }

    fn request_for(&self, provider: &dyn ProviderClient) -> Option<GenerationRequest> {
        provider.supports_vision().then(|| {
            GenerationRequest::text(self.prompt.clone(), 200, 0.3).with_image(self.frame.clone())
        })
    }

    fn normalize(&self, raw: &str) -> Result<LiveFeedback, MalformedOutput> {
        normalizer::normalize_live_feedback(raw)
    }

    fn terminal(&self) -> LiveFeedback {
        LiveFeedback {
            feedback: "Keep going! You're doing great.".to_string(),
            is_on_track: true,
            suggestions: Vec::new(),
        }
    }
}
