//! Ask command handler.
//!
//! Builds (or restores) the knowledge base, then answers a single question.

use super::{open_knowledge, print_json, query_engine, SourceArgs};
use clap::Args;
use estate_core::{AppConfig, AppResult};

/// Answer one question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    #[command(flatten)]
    pub sources: SourceArgs,

    /// Also print the retrieved items the answer was grounded on
    #[arg(long)]
    pub show_sources: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let knowledge = open_knowledge(config, &self.sources).await?;
        let engine = query_engine(&knowledge, config)?;
        let answer = engine.ask(&self.question).await?;

        if self.json {
            return print_json(&answer);
        }

        println!("{}", answer.answer);

        if self.show_sources {
            println!();
            for hit in &answer.sources {
                println!("[{}] {} (distance {:.4})", hit.rank, hit.item.kind(), hit.distance);
            }
        }

        Ok(())
    }
}
