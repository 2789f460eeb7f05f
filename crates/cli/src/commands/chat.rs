//! Chat command handler.
//!
//! Builds the knowledge base once and answers each line read from stdin.
//! Every question is answered independently.

use super::{open_knowledge, query_engine, SourceArgs};
use clap::Args;
use estate_core::{AppConfig, AppResult};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Answer questions read from stdin until "exit"
#[derive(Args, Debug)]
pub struct ChatCommand {
    #[command(flatten)]
    pub sources: SourceArgs,
}

impl ChatCommand {
    /// Execute the chat command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let knowledge = open_knowledge(config, &self.sources).await?;
        let engine = query_engine(&knowledge, config)?;

        println!("Ask about the listings or the community guidelines. Type 'exit' to quit.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let question = line.trim();

            if is_exit(question) {
                break;
            }
            if question.is_empty() {
                continue;
            }

            // A failed question does not end the session
            match engine.answer(question).await {
                Ok(answer) => println!("{}\n", answer),
                Err(e) => {
                    tracing::error!("Question failed: {}", e);
                    eprintln!("Error: {}", e);
                }
            }
        }

        Ok(())
    }
}

fn is_exit(line: &str) -> bool {
    matches!(line.to_lowercase().as_str(), "exit" | "quit")
}
