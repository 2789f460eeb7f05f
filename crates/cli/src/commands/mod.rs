//! Command handlers for the Estate CLI.
//!
//! Every command needs a ready knowledge base; `SourceArgs` and
//! [`open_knowledge`] cover the shared build-or-restore step.

pub mod ask;
pub mod build;
pub mod chat;
pub mod search;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use build::BuildCommand;
pub use chat::ChatCommand;
pub use search::SearchCommand;

use clap::Args;
use estate_core::{AppConfig, AppError, AppResult};
use estate_knowledge::{KnowledgeBase, QueryEngine};
use estate_llm::{create_client, LlmClient};
use estate_prompt::{load_answer_prompt, PROMPTS_DIR};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Where the knowledge base comes from
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Property listings CSV
    #[arg(long, required_unless_present = "snapshot", requires = "pdf")]
    pub csv: Option<PathBuf>,

    /// Community guidelines PDF
    #[arg(long, requires = "csv")]
    pub pdf: Option<PathBuf>,

    /// Restore a snapshot written by `estate build --save` instead of building
    #[arg(long, conflicts_with_all = ["csv", "pdf"])]
    pub snapshot: Option<PathBuf>,
}

/// Build the knowledge base from the given sources, or restore the snapshot.
pub async fn open_knowledge(config: &AppConfig, sources: &SourceArgs) -> AppResult<KnowledgeBase> {
    let mut knowledge = KnowledgeBase::from_config(config)?;

    match (&sources.snapshot, &sources.csv, &sources.pdf) {
        (Some(snapshot), _, _) => {
            tracing::info!("Loading knowledge base snapshot {:?}", snapshot);
            knowledge.load_snapshot(snapshot)?;
        }
        (None, Some(csv), Some(pdf)) => {
            tracing::info!("Building knowledge base from {:?} and {:?}", csv, pdf);
            let stats = knowledge.build(csv, pdf).await?;
            tracing::debug!("Build stats: {:?}", stats);
        }
        _ => {
            return Err(AppError::Config(
                "Provide --csv and --pdf, or --snapshot".to_string(),
            ))
        }
    }

    Ok(knowledge)
}

/// Chat client for the configured provider.
pub fn chat_client(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    create_client(
        &config.provider,
        config.endpoint.as_deref(),
        config.api_key.as_deref(),
        Duration::from_secs(config.request_timeout_secs),
    )
    .map_err(AppError::Config)
}

/// Query engine over `knowledge` using the configured model and prompt.
pub fn query_engine<'kb>(
    knowledge: &'kb KnowledgeBase,
    config: &AppConfig,
) -> AppResult<QueryEngine<'kb>> {
    let prompt = load_answer_prompt(Path::new(PROMPTS_DIR))?;
    tracing::debug!("Using answer prompt {}", prompt.id);

    Ok(QueryEngine::from_config(knowledge, chat_client(config)?, config).with_prompt(prompt))
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
