use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{
    CookingSession, FailureAnalysis, Recipe, SessionAction, SessionOwner, SessionStatus, Step,
    StepGuidance,
};
use crate::error::{AppResult, SessionError};
use crate::intent::{Intent, ParsedIntent};
use crate::mentor::{Guidance, Mentored, MentorService};
use crate::storage::Storage;
use crate::tasks::DiagnosisContext;

/// What the cook should see for the current step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub session_id: String,
    pub status: SessionStatus,
    pub step_number: u32,
    pub total_steps: u32,
    pub instruction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    /// Latest fetched tip, else the step's authored tip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
    /// Tier that produced `tip`. `None` for an authored tip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip_provider: Option<String>,
}

impl StepView {
    fn new(session: &CookingSession, recipe: &Recipe, step: &Step) -> Self {
        Self {
            session_id: session.id.clone(),
            status: session.status,
            step_number: step.step_number,
            total_steps: recipe.step_count(),
            instruction: step.instruction.clone(),
            expected_state: step.expected_state.clone(),
            duration_seconds: step.duration_seconds,
            tip: step.ai_tip.clone(),
            tip_provider: None,
        }
    }

    fn with_guidance(mut self, tip: String, provider: String) -> Self {
        self.tip = Some(tip);
        self.tip_provider = Some(provider);
        self
    }
}

/// Result of [`CookingSessionMachine::advance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvanceOutcome {
    pub current: StepView,
    /// Set when the cook tried to move past the last step.
    pub completion_ready: bool,
    /// Tip fetched for the newly entered step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<Guidance>,
}

/// Session effect of a voice command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum VoiceAction {
    Advanced(AdvanceOutcome),
    SteppedBack(StepView),
    Repeated(StepView),
    StatusChanged(CookingSession),
    /// The intent is for the caller to act on (timer, help, ingredients, unknown).
    Unhandled,
}

/// Result of [`CookingSessionMachine::handle_voice_command`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceCommandOutcome {
    pub intent: Mentored<ParsedIntent>,
    pub action: VoiceAction,
}

/// Cooking session state machine.
///
/// Holds no session state of its own: every operation reads the session snapshot,
/// computes the next one and writes it back whole.
#[derive(Clone)]
pub struct CookingSessionMachine {
    storage: Arc<dyn Storage>,
    mentor: MentorService,
}

impl CookingSessionMachine {
    pub fn new(storage: Arc<dyn Storage>, mentor: MentorService) -> Self {
        Self { storage, mentor }
    }

    pub fn mentor(&self) -> &MentorService {
        &self.mentor
    }

    /// Start a new session at step 1. Sessions are never deduplicated.
    pub async fn start(&self, recipe_id: &str, owner: SessionOwner) -> AppResult<CookingSession> {
        let recipe = self.recipe(recipe_id).await?;
        if recipe.step_count() == 0 {
            return Err(SessionError::OutOfRange { step: 1, max: 0 }.into());
        }

        let session = CookingSession::start(owner, &recipe.id);
        self.storage.save_session(&session).await?;

        info!(
            session_id = %session.id,
            recipe_id = %recipe.id,
            owner = %session.owner,
            "Cooking session started"
        );
        Ok(session)
    }

    /// Move to the next step and fetch guidance for it.
    ///
    /// At the last step this is a no-op that reports `completion_ready`. The new
    /// pointer is saved before guidance is requested.
    pub async fn advance(&self, session_id: &str) -> AppResult<AdvanceOutcome> {
        let (session, recipe) = self.load(session_id).await?;
        require(&session, &[SessionStatus::InProgress], "advance")?;

        if session.current_step >= recipe.step_count() {
            debug!(session_id, step = session.current_step, "Already at the last step");
            return Ok(AdvanceOutcome {
                current: self.view(&session, &recipe).await?,
                completion_ready: true,
                guidance: None,
            });
        }

        let session = session.at_step(session.current_step + 1);
        self.storage.save_session(&session).await?;
        let step = step_of(&recipe, session.current_step)?;

        let guidance = self.mentor.get_guidance(&step.instruction).await;
        self.remember_guidance(&session, &guidance).await;

        info!(
            session_id,
            step = session.current_step,
            provider = %guidance.provider_used,
            "Advanced to next step"
        );

        Ok(AdvanceOutcome {
            current: StepView::new(&session, &recipe, step)
                .with_guidance(guidance.tip.clone(), guidance.provider_used.clone()),
            completion_ready: false,
            guidance: Some(guidance),
        })
    }

    /// Move to the previous step. No-op at step 1.
    pub async fn go_back(&self, session_id: &str) -> AppResult<StepView> {
        let (session, recipe) = self.load(session_id).await?;
        require(&session, &[SessionStatus::InProgress], "go back in")?;

        if session.current_step <= 1 {
            return self.view(&session, &recipe).await;
        }

        let session = session.at_step(session.current_step - 1);
        self.storage.save_session(&session).await?;
        debug!(session_id, step = session.current_step, "Moved back one step");

        self.view(&session, &recipe).await
    }

    /// Jump to any step of a session that has not ended.
    pub async fn set_step(&self, session_id: &str, step_number: i64) -> AppResult<StepView> {
        let (session, recipe) = self.load(session_id).await?;
        if session.status.is_terminal() {
            return Err(SessionError::InvalidTransition {
                from: session.status.to_string(),
                action: "move",
            }
            .into());
        }

        let max = recipe.step_count();
        let step = u32::try_from(step_number)
            .ok()
            .filter(|n| (1..=max).contains(n))
            .ok_or(SessionError::OutOfRange {
                step: step_number,
                max,
            })?;

        let session = session.at_step(step);
        self.storage.save_session(&session).await?;
        debug!(session_id, step, "Step set");

        self.view(&session, &recipe).await
    }

    pub async fn pause(&self, session_id: &str) -> AppResult<CookingSession> {
        self.apply(session_id, SessionAction::Pause).await
    }

    pub async fn resume(&self, session_id: &str) -> AppResult<CookingSession> {
        self.apply(session_id, SessionAction::Resume).await
    }

    /// Finish the session from `in_progress` or `paused`.
    pub async fn complete(&self, session_id: &str) -> AppResult<CookingSession> {
        self.apply(session_id, SessionAction::Complete).await
    }

    pub async fn abandon(&self, session_id: &str) -> AppResult<CookingSession> {
        self.apply(session_id, SessionAction::Abandon).await
    }

    /// Current step with its latest tip. Never calls a provider.
    pub async fn get_current(&self, session_id: &str) -> AppResult<StepView> {
        let (session, recipe) = self.load(session_id).await?;
        self.view(&session, &recipe).await
    }

    /// Classify an utterance and apply it to the session.
    pub async fn handle_voice_command(
        &self,
        session_id: &str,
        text: &str,
    ) -> AppResult<VoiceCommandOutcome> {
        self.session(session_id).await?;

        let intent = self.mentor.parse_intent(text).await;
        debug!(
            session_id,
            intent = %intent.value.intent,
            provider = %intent.provider_used,
            "Voice command classified"
        );

        let action = match intent.value.intent {
            Intent::Next => VoiceAction::Advanced(self.advance(session_id).await?),
            Intent::Prev => VoiceAction::SteppedBack(self.go_back(session_id).await?),
            Intent::Repeat => VoiceAction::Repeated(self.get_current(session_id).await?),
            Intent::Pause => VoiceAction::StatusChanged(self.pause(session_id).await?),
            Intent::Resume => VoiceAction::StatusChanged(self.resume(session_id).await?),
            Intent::Timer | Intent::Ingredient | Intent::Help | Intent::Unknown => {
                VoiceAction::Unhandled
            }
        };

        Ok(VoiceCommandOutcome { intent, action })
    }

    /// Diagnose a failed dish and append the analysis to the owner's history.
    pub async fn record_failure(
        &self,
        owner: SessionOwner,
        session_id: Option<&str>,
        image_url: &str,
        context: Option<&DiagnosisContext>,
    ) -> AppResult<FailureAnalysis> {
        if let Some(id) = session_id {
            self.session(id).await?;
        }

        let diagnosis = self.mentor.diagnose_failure(image_url, context).await;
        let analysis = FailureAnalysis::from_diagnosis(
            owner,
            session_id.map(str::to_string),
            image_url,
            diagnosis.value,
            diagnosis.provider_used,
        );
        self.storage.append_failure_analysis(&analysis).await?;

        info!(
            analysis_id = %analysis.id,
            owner = %analysis.owner,
            severity = %analysis.severity,
            provider = %analysis.ai_provider,
            "Failure analysis recorded"
        );
        Ok(analysis)
    }

    /// The owner's sessions, newest first.
    pub async fn history(&self, owner: &SessionOwner) -> AppResult<Vec<CookingSession>> {
        Ok(self.storage.list_sessions(owner).await?)
    }

    /// The owner's failure analyses, newest first.
    pub async fn failure_history(&self, owner: &SessionOwner) -> AppResult<Vec<FailureAnalysis>> {
        Ok(self.storage.list_failure_analyses(owner).await?)
    }

    // Helpers

    async fn apply(&self, session_id: &str, action: SessionAction) -> AppResult<CookingSession> {
        let session = self.session(session_id).await?.transition(action)?;
        self.storage.save_session(&session).await?;
        info!(session_id, action = action.as_str(), status = %session.status, "Session status changed");
        Ok(session)
    }

    async fn session(&self, session_id: &str) -> AppResult<CookingSession> {
        self.storage
            .get_session(session_id)
            .await?
            .ok_or_else(|| SessionError::session_not_found(session_id).into())
    }

    async fn recipe(&self, recipe_id: &str) -> AppResult<Recipe> {
        self.storage
            .get_recipe(recipe_id)
            .await?
            .ok_or_else(|| SessionError::recipe_not_found(recipe_id).into())
    }

    async fn load(&self, session_id: &str) -> AppResult<(CookingSession, Recipe)> {
        let session = self.session(session_id).await?;
        let recipe = self.recipe(&session.recipe_id).await?;
        Ok((session, recipe))
    }

    async fn view(&self, session: &CookingSession, recipe: &Recipe) -> AppResult<StepView> {
        let step = step_of(recipe, session.current_step)?;
        let view = StepView::new(session, recipe, step);

        let view = match self
            .storage
            .latest_guidance(&session.id, session.current_step)
            .await?
        {
            Some(guidance) => view.with_guidance(guidance.tip, guidance.provider_used),
            None => view,
        };
        Ok(view)
    }

    /// Guidance is advisory: a failed write is logged and the advance still succeeds.
    async fn remember_guidance(&self, session: &CookingSession, guidance: &Guidance) {
        let record = StepGuidance {
            session_id: session.id.clone(),
            step_number: session.current_step,
            tip: guidance.tip.clone(),
            provider_used: guidance.provider_used.clone(),
            fetched_at: Utc::now(),
        };

        if let Err(e) = self.storage.record_guidance(&record).await {
            warn!(session_id = %session.id, step = session.current_step, error = %e, "Failed to store guidance");
        }
    }
}

fn require(
    session: &CookingSession,
    allowed: &[SessionStatus],
    action: &'static str,
) -> Result<(), SessionError> {
    if allowed.contains(&session.status) {
        Ok(())
    } else {
        Err(SessionError::InvalidTransition {
            from: session.status.to_string(),
            action,
        })
    }
}

fn step_of(recipe: &Recipe, step_number: u32) -> Result<&Step, SessionError> {
    recipe.step(step_number).ok_or(SessionError::OutOfRange {
        step: i64::from(step_number),
        max: recipe.step_count(),
    })
}
