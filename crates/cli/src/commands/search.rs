//! Search command handler.
//!
//! Runs retrieval only; no chat completion is requested.

use super::{open_knowledge, print_json, query_engine, SourceArgs};
use clap::Args;
use estate_core::{AppConfig, AppResult};

/// Show the items retrieved for a question
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Question or search text
    pub query: String,

    #[command(flatten)]
    pub sources: SourceArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    /// Execute the search command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let knowledge = open_knowledge(config, &self.sources).await?;
        let engine = query_engine(&knowledge, config)?;
        let hits = engine.retrieve(&self.query).await?;

        if self.json {
            return print_json(&hits);
        }

        if hits.is_empty() {
            println!("No results.");
            return Ok(());
        }

        for hit in &hits {
            println!(
                "#{} {} (distance {:.4})\n{}\n",
                hit.rank,
                hit.item.kind(),
                hit.distance,
                hit.item.render()
            );
        }

        Ok(())
    }
}
