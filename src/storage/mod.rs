//! Storage layer for recipes, cooking sessions and failure history.
//!
//! [`SqliteStorage`] is the production backend. The [`Storage`] trait is the seam the
//! session machine is written against, so tests can swap in a mock.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;

use crate::cooking::{CookingSession, FailureAnalysis, Recipe, SessionOwner, StepGuidance};
use crate::error::StorageResult;

/// Persistence operations used by the mentor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    // Recipe operations

    /// Insert a recipe together with its steps.
    async fn save_recipe(&self, recipe: &Recipe) -> StorageResult<()>;
    /// Get a recipe with its steps ordered by step number.
    async fn get_recipe(&self, id: &str) -> StorageResult<Option<Recipe>>;

    // Session operations

    /// Get a session by ID.
    async fn get_session(&self, id: &str) -> StorageResult<Option<CookingSession>>;
    /// Insert or replace a session snapshot.
    async fn save_session(&self, session: &CookingSession) -> StorageResult<()>;
    /// Sessions belonging to `owner`, newest first.
    async fn list_sessions(&self, owner: &SessionOwner) -> StorageResult<Vec<CookingSession>>;

    // Guidance operations

    /// Record a tip fetched for a session step.
    async fn record_guidance(&self, guidance: &StepGuidance) -> StorageResult<()>;
    /// Most recent tip for a session step.
    async fn latest_guidance(
        &self,
        session_id: &str,
        step_number: u32,
    ) -> StorageResult<Option<StepGuidance>>;

    // Failure analysis operations

    /// Append a failure analysis and return its ID. Records are never updated.
    async fn append_failure_analysis(&self, analysis: &FailureAnalysis) -> StorageResult<String>;
    /// Failure analyses belonging to `owner`, newest first.
    async fn list_failure_analyses(
        &self,
        owner: &SessionOwner,
    ) -> StorageResult<Vec<FailureAnalysis>>;
}
