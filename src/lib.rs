//! # ChefMentor
//!
//! Core of a cooking mentor: step-by-step session guidance backed by generative AI
//! providers that may be slow, unavailable or return malformed output.
//!
//! ## Features
//!
//! - **Tiered AI fallback**: every AI task walks an ordered provider chain and always
//!   ends in a deterministic terminal answer
//! - **Response normalization**: fenced or bare JSON decoded into strict typed results
//! - **Voice intents**: provider classification with an offline rule table
//! - **Cooking sessions**: a persisted state machine over a recipe's steps
//! - **Failure diagnosis**: photo plus context diagnosis with append-only history
//!
//! ## Architecture
//!
//! ```text
//! CLI / caller → CookingSessionMachine → MentorService → FallbackOrchestrator
//!                       ↓                                   ↓
//!                 SQLite (state)                Gemini → Groq → terminal
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use chefmentor::{Config, CookingSessionMachine, MentorService, SessionOwner};
//! use chefmentor::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = Arc::new(SqliteStorage::new(&config.database).await?);
//!     let mentor = MentorService::from_config(&config)?;
//!     let machine = CookingSessionMachine::new(storage, mentor);
//!     let session = machine.start("recipe-id", SessionOwner::Demo("demo".into())).await?;
//!     let next = machine.advance(&session.id).await?;
//!     println!("{}", next.current.instruction);
//!     Ok(())
//! }
//! ```

/// Operator command line.
pub mod cli;
/// Configuration management.
pub mod config;
/// Recipes, sessions and the session state machine.
pub mod cooking;
/// Error types and result aliases for the application.
pub mod error;
/// Voice intent classification.
pub mod intent;
/// Mentor service facade over the AI tasks.
pub mod mentor;
/// Tiered fallback orchestration and response normalization.
pub mod orchestrator;
/// Prompt templates.
pub mod prompts;
/// Generative model provider clients.
pub mod providers;
/// SQLite storage layer for persistence.
pub mod storage;
/// AI task definitions.
pub mod tasks;

pub use config::Config;
pub use cooking::{CookingSessionMachine, SessionOwner, SessionStatus};
pub use error::{AppError, AppResult};
pub use mentor::MentorService;
pub use orchestrator::FallbackOrchestrator;
