use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;
use crate::tasks::{Diagnosis, Severity};

/// One instruction of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// 1-indexed position within the recipe.
    pub step_number: u32,
    pub instruction: String,
    /// What the dish should look like when the step is done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    /// Authored tip shown when no guidance has been fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_tip: Option<String>,
}

impl Step {
    /// A step with only an instruction. The number is assigned by [`Recipe::new`].
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            step_number: 0,
            instruction: instruction.into(),
            expected_state: None,
            duration_seconds: None,
            ai_tip: None,
        }
    }

    pub fn with_expected_state(mut self, expected_state: impl Into<String>) -> Self {
        self.expected_state = Some(expected_state.into());
        self
    }

    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_tip(mut self, tip: impl Into<String>) -> Self {
        self.ai_tip = Some(tip.into());
        self
    }
}

/// An ordered, immutable list of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    steps: Vec<Step>,
    pub created_at: DateTime<Utc>,
}

impl Recipe {
    /// Create a recipe, numbering steps 1..=N in the given order.
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name, steps, Utc::now())
    }

    pub(crate) fn with_id(
        id: String,
        name: impl Into<String>,
        steps: Vec<Step>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(i, mut step)| {
                step.step_number = i as u32 + 1;
                step
            })
            .collect();
        Self {
            id,
            name: name.into(),
            steps,
            created_at,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_count(&self) -> u32 {
        self.steps.len() as u32
    }

    /// Step by 1-indexed number.
    pub fn step(&self, step_number: u32) -> Option<&Step> {
        step_number
            .checked_sub(1)
            .and_then(|i| self.steps.get(i as usize))
    }
}

/// Who a session belongs to. Exactly one identity, by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SessionOwner {
    /// A registered user.
    User(String),
    /// An anonymous demo identity.
    Demo(String),
}

impl SessionOwner {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            SessionOwner::User(id) => Some(id),
            SessionOwner::Demo(_) => None,
        }
    }

    pub fn demo_session_id(&self) -> Option<&str> {
        match self {
            SessionOwner::Demo(id) => Some(id),
            SessionOwner::User(_) => None,
        }
    }

    /// Rebuild from the two nullable identity columns.
    pub fn from_columns(user_id: Option<String>, demo_session_id: Option<String>) -> Option<Self> {
        match (user_id, demo_session_id) {
            (Some(user), None) => Some(SessionOwner::User(user)),
            (None, Some(demo)) => Some(SessionOwner::Demo(demo)),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionOwner::User(id) => write!(f, "user:{}", id),
            SessionOwner::Demo(id) => write!(f, "demo:{}", id),
        }
    }
}

/// Lifecycle status of a cooking session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    NotStarted,
    InProgress,
    Paused,
    Completed,
    Abandoned,
}

impl SessionStatus {
    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::NotStarted => write!(f, "not_started"),
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Paused => write!(f, "paused"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_started" => Ok(SessionStatus::NotStarted),
            "in_progress" => Ok(SessionStatus::InProgress),
            "paused" => Ok(SessionStatus::Paused),
            "completed" => Ok(SessionStatus::Completed),
            "abandoned" => Ok(SessionStatus::Abandoned),
            _ => Err(format!("Unknown session status: {}", s)),
        }
    }
}

/// Status changes a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Pause,
    Resume,
    Complete,
    Abandon,
}

impl SessionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionAction::Pause => "pause",
            SessionAction::Resume => "resume",
            SessionAction::Complete => "complete",
            SessionAction::Abandon => "abandon",
        }
    }
}

/// Progress of one cook through one recipe.
///
/// Values are immutable snapshots: every change returns a new session that the
/// caller persists as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookingSession {
    pub id: String,
    pub owner: SessionOwner,
    pub recipe_id: String,
    /// 1-indexed pointer into the recipe's steps.
    pub current_step: u32,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl CookingSession {
    /// A freshly started session at step 1.
    pub fn start(owner: SessionOwner, recipe_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner,
            recipe_id: recipe_id.into(),
            current_step: 1,
            status: SessionStatus::InProgress,
            started_at: Some(now),
            completed_at: None,
            updated_at: now,
        }
    }

    /// Same session pointing at `step_number`.
    pub fn at_step(&self, step_number: u32) -> Self {
        Self {
            current_step: step_number,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Apply a status change, or explain why it is not allowed from the current status.
    pub fn transition(&self, action: SessionAction) -> Result<Self, SessionError> {
        use SessionStatus::*;

        let next = match (action, self.status) {
            (SessionAction::Pause, InProgress) => Paused,
            (SessionAction::Resume, Paused) => InProgress,
            (SessionAction::Complete, InProgress | Paused) => Completed,
            (SessionAction::Abandon, InProgress | Paused) => Abandoned,
            (action, from) => {
                return Err(SessionError::InvalidTransition {
                    from: from.to_string(),
                    action: action.as_str(),
                })
            }
        };

        let now = Utc::now();
        Ok(Self {
            status: next,
            completed_at: if next == Completed {
                Some(now)
            } else {
                self.completed_at
            },
            updated_at: now,
            ..self.clone()
        })
    }
}

/// A tip fetched for one step of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepGuidance {
    pub session_id: String,
    pub step_number: u32,
    pub tip: String,
    pub provider_used: String,
    pub fetched_at: DateTime<Utc>,
}

/// Immutable record of one failure diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureAnalysis {
    pub id: String,
    pub owner: SessionOwner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooking_session_id: Option<String>,
    pub media_url: String,
    pub root_cause: String,
    pub explanation: String,
    pub tips: Vec<String>,
    pub severity: Severity,
    pub confidence: f64,
    /// Tier that produced the diagnosis.
    pub ai_provider: String,
    pub created_at: DateTime<Utc>,
}

impl FailureAnalysis {
    pub fn from_diagnosis(
        owner: SessionOwner,
        cooking_session_id: Option<String>,
        media_url: impl Into<String>,
        diagnosis: Diagnosis,
        ai_provider: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner,
            cooking_session_id,
            media_url: media_url.into(),
            root_cause: diagnosis.root_cause,
            explanation: diagnosis.explanation,
            tips: diagnosis.tips,
            severity: diagnosis.severity,
            confidence: diagnosis.confidence.clamp(0.0, 1.0),
            ai_provider: ai_provider.into(),
            created_at: Utc::now(),
        }
    }
}
