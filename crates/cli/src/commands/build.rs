//! Build command handler.

use super::print_json;
use clap::Args;
use estate_core::{AppConfig, AppResult};
use estate_knowledge::KnowledgeBase;
use std::path::PathBuf;

/// Build the knowledge base and print build statistics
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Property listings CSV
    #[arg(long)]
    pub csv: PathBuf,

    /// Community guidelines PDF
    #[arg(long)]
    pub pdf: PathBuf,

    /// Write a snapshot of the built store to this path
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    /// Execute the build command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing build command");

        let mut knowledge = KnowledgeBase::from_config(config)?;
        let stats = knowledge.build(&self.csv, &self.pdf).await?;

        if let Some(path) = &self.save {
            knowledge.save_snapshot(path)?;
            tracing::info!("Snapshot written to {:?}", path);
        }

        if self.json {
            print_json(&stats)
        } else {
            println!("{}", stats);
            if let Some(path) = &self.save {
                println!("Snapshot:           {}", path.display());
            }
            Ok(())
        }
    }
}
