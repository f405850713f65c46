use serde::{Deserialize, Serialize};

use crate::orchestrator::{normalizer, AiTask, MalformedOutput, TaskKind};
use crate::prompts;
use crate::providers::{GenerationRequest, ProviderClient};

/// Served when no provider produced a reply.
pub const FALLBACK_CHAT_REPLY: &str =
    "I'm having trouble connecting right now. Keep following the recipe steps and ask me again in a moment.";

/// One turn of a mentor conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Where the cook is while chatting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_instruction: Option<String>,
}

impl ChatContext {
    fn to_prompt_text(&self) -> String {
        let mut text = String::new();
        if let Some(name) = &self.recipe_name {
            text.push_str(&format!("\nRecipe: {}", name));
        }
        if let Some(step) = self.current_step {
            text.push_str(&format!("\nCurrent step: {}", step));
        }
        if let Some(instruction) = &self.step_instruction {
            text.push_str(&format!("\nStep instruction: {}", instruction));
        }
        text
    }
}

/// Conversational reply from the mentor.
pub struct MentorChatTask {
    prompt: String,
}

impl MentorChatTask {
    pub fn new(turns: &[ChatTurn], context: &ChatContext) -> Self {
        let transcript = turns
            .iter()
            .map(|t| {
                let speaker = if t.role == "assistant" { "Mentor" } else { "Cook" };
                format!("{}: {}", speaker, t.content.trim())
            })
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            prompt: prompts::mentor_chat(&transcript, &context.to_prompt_text()),
        }
    }
}

impl AiTask for MentorChatTask {
    type Output = String;

    fn kind(&self) -> TaskKind {
        TaskKind::MentorChat
    }

    fn request_for(&self, _provider: &dyn ProviderClient) -> Option<GenerationRequest> {
        Some(GenerationRequest::text(self.prompt.clone(), 200, 0.7))
    }

    fn normalize(&self, raw: &str) -> Result<String, MalformedOutput> {
        normalizer::normalize_chat_reply(raw)
    }

    fn terminal(&self) -> String {
        FALLBACK_CHAT_REPLY.to_string()
    }
}
