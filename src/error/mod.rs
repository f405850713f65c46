use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Corrupt {entity} record {id}: {message}")]
    Corrupt {
        entity: &'static str,
        id: String,
        message: String,
    },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Errors from a single AI provider call.
///
/// These never leave the orchestrator; they are recorded as a failed tier attempt.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("Image unavailable: {message}")]
    Image { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    /// Whether this error represents an elapsed deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            ProviderError::Timeout { .. } => true,
            ProviderError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Session and data errors that cross the core's boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Step {step} out of range (recipe has {max} steps)")]
    OutOfRange { step: i64, max: u32 },

    #[error("Cannot {action} a session that is {from}")]
    InvalidTransition { from: String, action: &'static str },
}

impl SessionError {
    pub(crate) fn recipe_not_found(id: impl Into<String>) -> Self {
        SessionError::NotFound {
            entity: "Recipe",
            id: id.into(),
        }
    }

    pub(crate) fn session_not_found(id: impl Into<String>) -> Self {
        SessionError::NotFound {
            entity: "Session",
            id: id.into(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;
