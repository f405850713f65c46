use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::Storage;
use crate::config::DatabaseConfig;
use crate::cooking::{
    CookingSession, FailureAnalysis, Recipe, SessionOwner, SessionStatus, Step, StepGuidance,
};
use crate::error::{StorageError, StorageResult};
use crate::tasks::Severity;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create a private in-memory database, used by tests and the demo CLI.
    ///
    /// The pool holds a single connection that is never recycled, since every new
    /// connection to `:memory:` would see an empty database.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn save_recipe(&self, recipe: &Recipe) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO recipes (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&recipe.id)
            .bind(&recipe.name)
            .bind(timestamp(&recipe.created_at))
            .execute(&mut *tx)
            .await?;

        for step in recipe.steps() {
            sqlx::query(
                r#"
                INSERT INTO recipe_steps
                    (recipe_id, step_number, instruction, expected_state, duration_seconds, ai_tip)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&recipe.id)
            .bind(step.step_number as i64)
            .bind(&step.instruction)
            .bind(&step.expected_state)
            .bind(step.duration_seconds.map(i64::from))
            .bind(&step.ai_tip)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(recipe_id = %recipe.id, steps = recipe.step_count(), "Recipe saved");
        Ok(())
    }

    async fn get_recipe(&self, id: &str) -> StorageResult<Option<Recipe>> {
        let row: Option<RecipeRow> =
            sqlx::query_as("SELECT id, name, created_at FROM recipes WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let step_rows: Vec<StepRow> = sqlx::query_as(
            r#"
            SELECT step_number, instruction, expected_state, duration_seconds, ai_tip
            FROM recipe_steps
            WHERE recipe_id = ?
            ORDER BY step_number ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut steps = Vec::with_capacity(step_rows.len());
        for (i, step_row) in step_rows.into_iter().enumerate() {
            if step_row.step_number != i as i64 + 1 {
                return Err(corrupt(
                    "recipe",
                    id,
                    format!("step numbers are not contiguous at step {}", step_row.step_number),
                ));
            }
            steps.push(step_row.into_step(id)?);
        }

        let created_at = parse_timestamp("recipe", id, &row.created_at)?;
        Ok(Some(Recipe::with_id(row.id, row.name, steps, created_at)))
    }

    async fn get_session(&self, id: &str) -> StorageResult<Option<CookingSession>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, demo_session_id, recipe_id, current_step, status,
                   started_at, completed_at, updated_at
            FROM cooking_sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CookingSession::try_from).transpose()
    }

    async fn save_session(&self, session: &CookingSession) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cooking_sessions
                (id, user_id, demo_session_id, recipe_id, current_step, status,
                 started_at, completed_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                current_step = excluded.current_step,
                status = excluded.status,
                started_at = excluded.started_at,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&session.id)
        .bind(session.owner.user_id())
        .bind(session.owner.demo_session_id())
        .bind(&session.recipe_id)
        .bind(session.current_step as i64)
        .bind(session.status.to_string())
        .bind(session.started_at.as_ref().map(timestamp))
        .bind(session.completed_at.as_ref().map(timestamp))
        .bind(timestamp(&session.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_sessions(&self, owner: &SessionOwner) -> StorageResult<Vec<CookingSession>> {
        let (column, owner_id) = owner_column(owner);
        let sql = format!(
            r#"
            SELECT id, user_id, demo_session_id, recipe_id, current_step, status,
                   started_at, completed_at, updated_at
            FROM cooking_sessions
            WHERE {} = ?
            ORDER BY COALESCE(started_at, updated_at) DESC, rowid DESC
            "#,
            column
        );

        let rows: Vec<SessionRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(CookingSession::try_from).collect()
    }

    async fn record_guidance(&self, guidance: &StepGuidance) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO step_guidance (session_id, step_number, tip, provider_used, fetched_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&guidance.session_id)
        .bind(guidance.step_number as i64)
        .bind(&guidance.tip)
        .bind(&guidance.provider_used)
        .bind(timestamp(&guidance.fetched_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_guidance(
        &self,
        session_id: &str,
        step_number: u32,
    ) -> StorageResult<Option<StepGuidance>> {
        let row: Option<GuidanceRow> = sqlx::query_as(
            r#"
            SELECT session_id, step_number, tip, provider_used, fetched_at
            FROM step_guidance
            WHERE session_id = ? AND step_number = ?
            ORDER BY fetched_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .bind(step_number as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StepGuidance::try_from).transpose()
    }

    async fn append_failure_analysis(&self, analysis: &FailureAnalysis) -> StorageResult<String> {
        let tips = serde_json::to_string(&analysis.tips).map_err(|e| StorageError::Query {
            message: format!("Failed to encode tips: {}", e),
        })?;

        sqlx::query(
            r#"
            INSERT INTO failure_analyses
                (id, user_id, demo_session_id, cooking_session_id, media_url, root_cause,
                 explanation, tips, severity, confidence, ai_provider, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&analysis.id)
        .bind(analysis.owner.user_id())
        .bind(analysis.owner.demo_session_id())
        .bind(&analysis.cooking_session_id)
        .bind(&analysis.media_url)
        .bind(&analysis.root_cause)
        .bind(&analysis.explanation)
        .bind(tips)
        .bind(analysis.severity.to_string())
        .bind(analysis.confidence)
        .bind(&analysis.ai_provider)
        .bind(timestamp(&analysis.created_at))
        .execute(&self.pool)
        .await?;

        debug!(analysis_id = %analysis.id, owner = %analysis.owner, "Failure analysis appended");
        Ok(analysis.id.clone())
    }

    async fn list_failure_analyses(
        &self,
        owner: &SessionOwner,
    ) -> StorageResult<Vec<FailureAnalysis>> {
        let (column, owner_id) = owner_column(owner);
        let sql = format!(
            r#"
            SELECT id, user_id, demo_session_id, cooking_session_id, media_url, root_cause,
                   explanation, tips, severity, confidence, ai_provider, created_at
            FROM failure_analyses
            WHERE {} = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
            column
        );

        let rows: Vec<FailureAnalysisRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(FailureAnalysis::try_from).collect()
    }
}

// Helpers

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(entity: &'static str, id: &str, value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(entity, id, format!("invalid timestamp '{}': {}", value, e)))
}

fn parse_step_number(entity: &'static str, id: &str, value: i64) -> StorageResult<u32> {
    u32::try_from(value)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| corrupt(entity, id, format!("invalid step number {}", value)))
}

fn corrupt(entity: &'static str, id: &str, message: String) -> StorageError {
    StorageError::Corrupt {
        entity,
        id: id.to_string(),
        message,
    }
}

fn owner_column(owner: &SessionOwner) -> (&'static str, &str) {
    match owner {
        SessionOwner::User(id) => ("user_id", id.as_str()),
        SessionOwner::Demo(id) => ("demo_session_id", id.as_str()),
    }
}

fn owner_from_row(
    entity: &'static str,
    id: &str,
    user_id: Option<String>,
    demo_session_id: Option<String>,
) -> StorageResult<SessionOwner> {
    SessionOwner::from_columns(user_id, demo_session_id)
        .ok_or_else(|| corrupt(entity, id, "expected exactly one owner identity".to_string()))
}

// Row types for SQLx

#[derive(sqlx::FromRow)]
struct RecipeRow {
    id: String,
    name: String,
    created_at: String,
}

#[derive(sqlx::FromRow)]
struct StepRow {
    step_number: i64,
    instruction: String,
    expected_state: Option<String>,
    duration_seconds: Option<i64>,
    ai_tip: Option<String>,
}

impl StepRow {
    fn into_step(self, recipe_id: &str) -> StorageResult<Step> {
        let duration_seconds = self
            .duration_seconds
            .map(|d| {
                u32::try_from(d)
                    .map_err(|_| corrupt("recipe", recipe_id, format!("invalid duration {}", d)))
            })
            .transpose()?;

        Ok(Step {
            step_number: parse_step_number("recipe", recipe_id, self.step_number)?,
            instruction: self.instruction,
            expected_state: self.expected_state,
            duration_seconds,
            ai_tip: self.ai_tip,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: Option<String>,
    demo_session_id: Option<String>,
    recipe_id: String,
    current_step: i64,
    status: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    updated_at: String,
}

impl TryFrom<SessionRow> for CookingSession {
    type Error = StorageError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        const ENTITY: &str = "session";
        let id = row.id.as_str();

        let status = SessionStatus::from_str(&row.status).map_err(|e| corrupt(ENTITY, id, e))?;
        let started_at = row
            .started_at
            .as_deref()
            .map(|v| parse_timestamp(ENTITY, id, v))
            .transpose()?;
        let completed_at = row
            .completed_at
            .as_deref()
            .map(|v| parse_timestamp(ENTITY, id, v))
            .transpose()?;

        Ok(CookingSession {
            owner: owner_from_row(ENTITY, id, row.user_id, row.demo_session_id)?,
            current_step: parse_step_number(ENTITY, id, row.current_step)?,
            updated_at: parse_timestamp(ENTITY, id, &row.updated_at)?,
            status,
            started_at,
            completed_at,
            recipe_id: row.recipe_id,
            id: row.id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GuidanceRow {
    session_id: String,
    step_number: i64,
    tip: String,
    provider_used: String,
    fetched_at: String,
}

impl TryFrom<GuidanceRow> for StepGuidance {
    type Error = StorageError;

    fn try_from(row: GuidanceRow) -> Result<Self, Self::Error> {
        const ENTITY: &str = "guidance";

        Ok(StepGuidance {
            step_number: parse_step_number(ENTITY, &row.session_id, row.step_number)?,
            fetched_at: parse_timestamp(ENTITY, &row.session_id, &row.fetched_at)?,
            tip: row.tip,
            provider_used: row.provider_used,
            session_id: row.session_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FailureAnalysisRow {
    id: String,
    user_id: Option<String>,
    demo_session_id: Option<String>,
    cooking_session_id: Option<String>,
    media_url: String,
    root_cause: String,
    explanation: String,
    tips: String,
    severity: String,
    confidence: f64,
    ai_provider: String,
    created_at: String,
}

impl TryFrom<FailureAnalysisRow> for FailureAnalysis {
    type Error = StorageError;

    fn try_from(row: FailureAnalysisRow) -> Result<Self, Self::Error> {
        const ENTITY: &str = "failure analysis";
        let id = row.id.as_str();

        let tips: Vec<String> = serde_json::from_str(&row.tips)
            .map_err(|e| corrupt(ENTITY, id, format!("invalid tips: {}", e)))?;
        let severity = Severity::from_str(&row.severity).map_err(|e| corrupt(ENTITY, id, e))?;

        Ok(FailureAnalysis {
            owner: owner_from_row(ENTITY, id, row.user_id, row.demo_session_id)?,
            created_at: parse_timestamp(ENTITY, id, &row.created_at)?,
            tips,
            severity,
            cooking_session_id: row.cooking_session_id,
            media_url: row.media_url,
            root_cause: row.root_cause,
            explanation: row.explanation,
            confidence: row.confidence,
            ai_provider: row.ai_provider,
            id: row.id,
        })
    }
}
