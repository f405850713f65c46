//! Operator command line.
//!
//! Thin wrapper over the library: each command calls one mentor or session
//! operation and prints its result as JSON.

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::cooking::{CookingSessionMachine, Recipe, SessionOwner, Step};
use crate::providers::ImageData;
use crate::storage::Storage;
use crate::tasks::{ChatContext, ChatTurn, DiagnosisContext, LiveStepContext};

/// ChefMentor - step-by-step cooking guidance with AI fallback
#[derive(Parser, Debug)]
#[command(name = "chefmentor")]
#[command(about = "ChefMentor - step-by-step cooking guidance with AI fallback", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Get a mentoring tip for a step instruction
    Tip {
        instruction: String,
    },

    /// Classify a voice command
    Intent {
        text: String,
    },

    /// Check an instruction for food safety issues
    Safety {
        instruction: String,
    },

    /// Diagnose a failed dish from a photo URL without recording it
    Diagnose {
        image_url: String,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Ask the mentor a question
    Chat {
        message: String,

        /// Recipe being cooked
        #[arg(long)]
        recipe: Option<String>,

        /// Current step number
        #[arg(long)]
        step: Option<u32>,
    },

    /// Get feedback on a photo of the current step
    Live {
        /// Image file to send
        image: PathBuf,

        #[arg(long)]
        recipe: String,

        #[arg(long)]
        step: u32,

        /// Instruction of the step being cooked
        #[arg(long)]
        instruction: String,
    },

    /// Create the demo recipe and print its ID
    SeedDemo,

    /// Cooking session operations
    #[command(subcommand)]
    Session(SessionCommands),

    /// Failure analysis operations
    #[command(subcommand)]
    Failure(FailureCommands),
}

#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommands {
    /// Start a session for a recipe
    Start {
        recipe_id: String,

        #[command(flatten)]
        owner: OwnerArgs,
    },

    /// Move to the next step
    Advance { session_id: String },

    /// Move to the previous step
    Back { session_id: String },

    /// Jump to a step
    SetStep {
        session_id: String,

        #[arg(allow_negative_numbers = true)]
        step: i64,
    },

    Pause { session_id: String },

    Resume { session_id: String },

    Complete { session_id: String },

    Abandon { session_id: String },

    /// Show the current step
    Current { session_id: String },

    /// Apply a spoken command to the session
    Voice { session_id: String, text: String },

    /// List an owner's sessions
    History {
        #[command(flatten)]
        owner: OwnerArgs,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum FailureCommands {
    /// Diagnose a failed dish and save the analysis
    Record {
        image_url: String,

        #[command(flatten)]
        owner: OwnerArgs,

        /// Session the dish was cooked in
        #[arg(long)]
        session: Option<String>,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// List an owner's failure analyses
    History {
        #[command(flatten)]
        owner: OwnerArgs,
    },
}

/// Exactly one owner identity.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct OwnerArgs {
    /// Registered user ID
    #[arg(long)]
    pub user: Option<String>,

    /// Anonymous demo ID
    #[arg(long)]
    pub demo: Option<String>,
}

impl OwnerArgs {
    pub fn owner(&self) -> Option<SessionOwner> {
        SessionOwner::from_columns(self.user.clone(), self.demo.clone())
    }
}

/// Answers that sharpen a failure diagnosis.
#[derive(Args, Debug, Clone, Default)]
pub struct ContextArgs {
    /// Heat level used
    #[arg(long)]
    pub heat: Option<String>,

    /// How long it cooked
    #[arg(long)]
    pub timing: Option<String>,

    /// Changes made to the recipe
    #[arg(long)]
    pub modifications: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

impl ContextArgs {
    fn into_context(self) -> Option<DiagnosisContext> {
        let context = DiagnosisContext {
            heat_level: self.heat,
            timing: self.timing,
            modifications: self.modifications,
            notes: self.notes,
        };
        (!context.is_empty()).then_some(context)
    }
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }

    fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(json) => Self::success(json),
            Err(e) => Self::error(format!("Failed to encode output: {}", e)),
        }
    }

    fn from_result<T: Serialize, E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::json(&value),
            Err(e) => Self::error(format!("Error: {}", e)),
        }
    }
}

/// Recipe created by `seed-demo`.
pub fn demo_recipe() -> Recipe {
    Recipe::new(
        "Garlic Butter Pasta",
        vec![
            Step::new("Bring a large pot of salted water to a boil and cook the spaghetti")
                .with_duration(600)
                .with_expected_state("Pasta is tender with a slight bite"),
            Step::new("Melt the butter in a pan over medium heat and add the minced garlic")
                .with_duration(120)
                .with_expected_state("Garlic is fragrant and just golden")
                .with_tip("Pull the pan off the heat the moment the garlic smells nutty"),
            Step::new("Toss the drained pasta in the garlic butter with a splash of pasta water")
                .with_expected_state("Sauce clings to every strand"),
            Step::new("Finish with parmesan, black pepper and chopped parsley"),
        ],
    )
}

/// Execute a CLI command.
pub async fn execute_command(
    command: Commands,
    machine: &CookingSessionMachine,
    storage: &dyn Storage,
) -> CliResult {
    let mentor = machine.mentor();

    match command {
        Commands::Tip { instruction } => CliResult::json(&mentor.get_guidance(&instruction).await),
        Commands::Intent { text } => CliResult::json(&mentor.parse_intent(&text).await),
        Commands::Safety { instruction } => {
            CliResult::json(&mentor.check_food_safety(&instruction).await)
        }
        Commands::Diagnose { image_url, context } => {
            let context = context.into_context();
            CliResult::json(&mentor.diagnose_failure(&image_url, context.as_ref()).await)
        }
        Commands::Chat {
            message,
            recipe,
            step,
        } => {
            let context = ChatContext {
                recipe_name: recipe,
                current_step: step,
                step_instruction: None,
            };
            CliResult::json(&mentor.chat(&[ChatTurn::user(message)], &context).await)
        }
        Commands::Live {
            image,
            recipe,
            step,
            instruction,
        } => {
            let bytes = match tokio::fs::read(&image).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    return CliResult::error(format!(
                        "Failed to read {}: {}",
                        image.display(),
                        e
                    ))
                }
            };
            let frame = ImageData::new(bytes, mime_for(&image));
            let step = LiveStepContext {
                recipe_name: recipe,
                step_number: step,
                step_instruction: instruction,
            };
            CliResult::json(&mentor.live_feedback(frame, &step).await)
        }
        Commands::SeedDemo => {
            let recipe = demo_recipe();
            match storage.save_recipe(&recipe).await {
                Ok(()) => CliResult::json(&recipe),
                Err(e) => CliResult::error(format!("Failed to save demo recipe: {}", e)),
            }
        }
        Commands::Session(command) => execute_session(command, machine).await,
        Commands::Failure(command) => execute_failure(command, machine).await,
    }
}

async fn execute_session(command: SessionCommands, machine: &CookingSessionMachine) -> CliResult {
    match command {
        SessionCommands::Start { recipe_id, owner } => match owner.owner() {
            Some(owner) => CliResult::from_result(machine.start(&recipe_id, owner).await),
            None => CliResult::error("Pass exactly one of --user or --demo"),
        },
        SessionCommands::Advance { session_id } => {
            CliResult::from_result(machine.advance(&session_id).await)
        }
        SessionCommands::Back { session_id } => {
            CliResult::from_result(machine.go_back(&session_id).await)
        }
        SessionCommands::SetStep { session_id, step } => {
            CliResult::from_result(machine.set_step(&session_id, step).await)
        }
        SessionCommands::Pause { session_id } => {
            CliResult::from_result(machine.pause(&session_id).await)
        }
        SessionCommands::Resume { session_id } => {
            CliResult::from_result(machine.resume(&session_id).await)
        }
        SessionCommands::Complete { session_id } => {
            CliResult::from_result(machine.complete(&session_id).await)
        }
        SessionCommands::Abandon { session_id } => {
            CliResult::from_result(machine.abandon(&session_id).await)
        }
        SessionCommands::Current { session_id } => {
            CliResult::from_result(machine.get_current(&session_id).await)
        }
        SessionCommands::Voice { session_id, text } => {
            CliResult::from_result(machine.handle_voice_command(&session_id, &text).await)
        }
        SessionCommands::History { owner } => match owner.owner() {
            Some(owner) => CliResult::from_result(machine.history(&owner).await),
            None => CliResult::error("Pass exactly one of --user or --demo"),
        },
    }
}

async fn execute_failure(command: FailureCommands, machine: &CookingSessionMachine) -> CliResult {
    match command {
        FailureCommands::Record {
            image_url,
            owner,
            session,
            context,
        } => {
            let Some(owner) = owner.owner() else {
                return CliResult::error("Pass exactly one of --user or --demo");
            };
            let context = context.into_context();
            CliResult::from_result(
                machine
                    .record_failure(owner, session.as_deref(), &image_url, context.as_ref())
                    .await,
            )
        }
        FailureCommands::History { owner } => match owner.owner() {
            Some(owner) => CliResult::from_result(machine.failure_history(&owner).await),
            None => CliResult::error("Pass exactly one of --user or --demo"),
        },
    }
}

fn mime_for(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_session_commands() {
        let cli = Cli::try_parse_from([
            "chefmentor",
            "session",
            "start",
            "recipe-1",
            "--demo",
            "demo-1",
        ])
        .unwrap();
        match cli.command {
            Commands::Session(SessionCommands::Start { recipe_id, owner }) => {
                assert_eq!(recipe_id, "recipe-1");
                assert_eq!(owner.owner(), Some(SessionOwner::Demo("demo-1".to_string())));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::try_parse_from(["chefmentor", "session", "set-step", "s-1", "-2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Session(SessionCommands::SetStep { step: -2, .. })
        ));
    }

    #[test]
    fn test_cli_requires_exactly_one_owner() {
        assert!(Cli::try_parse_from(["chefmentor", "session", "history"]).is_err());
        assert!(Cli::try_parse_from([
            "chefmentor",
            "session",
            "history",
            "--user",
            "u",
            "--demo",
            "d"
        ])
        .is_err());
    }

    #[test]
    fn test_empty_context_is_none() {
        assert!(ContextArgs::default().into_context().is_none());
        let context = ContextArgs {
            heat: Some("high".to_string()),
            ..Default::default()
        }
        .into_context()
        .unwrap();
        assert_eq!(context.heat_level.as_deref(), Some("high"));
    }

    #[test]
    fn test_demo_recipe_has_four_steps() {
        let recipe = demo_recipe();
        assert_eq!(recipe.step_count(), 4);
        assert!(recipe.step(2).and_then(|s| s.ai_tip.as_ref()).is_some());
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for(std::path::Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for(std::path::Path::new("frame")), "image/jpeg");
    }
}
