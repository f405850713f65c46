use crate::orchestrator::{normalizer, AiTask, MalformedOutput, TaskKind};
use crate::prompts;
use crate::providers::{GenerationRequest, ProviderClient};

/// Served when no provider produced a tip.
pub const FALLBACK_TIP: &str = "Keep going, you're doing great! Trust the process.";

/// Short mentoring tip for one step instruction.
pub struct StepTipTask<'a> {
    instruction: &'a str,
}

impl<'a> StepTipTask<'a> {
    pub fn new(instruction: &'a str) -> Self {
        Self { instruction }
    }
}

impl AiTask for StepTipTask<'_> {
    type Output = String;

    fn kind(&self) -> TaskKind {
        TaskKind::StepTip
    }

    fn request_for(&self, _provider: &dyn ProviderClient) -> Option<GenerationRequest> {
        Some(GenerationRequest::text(
            prompts::step_tip(self.instruction),
            50,
            0.7,
        ))
    }

    fn normalize(&self, raw: &str) -> Result<String, MalformedOutput> {
        normalizer::normalize_tip(raw)
    }

    fn terminal(&self) -> String {
        FALLBACK_TIP.to_string()
    }
}
