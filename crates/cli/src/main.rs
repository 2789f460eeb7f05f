//! Estate CLI
//!
//! Main entry point for the estate command-line tool.
//! Answers questions about property listings and community guidelines.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, BuildCommand, ChatCommand, SearchCommand};
use estate_core::logging::{self, LogFormat};
use estate_core::{AppConfig, AppError, AppResult, ConfigOverrides};
use std::path::PathBuf;
use std::process::ExitCode;

/// Estate CLI - question answering over property listings and guidelines
#[derive(Parser, Debug)]
#[command(name = "estate")]
#[command(about = "Question answering over property listings and guidelines", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file (default: ./estate.yaml)
    #[arg(short, long, global = true, env = "ESTATE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Chat provider (openai, ollama)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Chat model identifier
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Embedding provider (openai, ollama, mock)
    #[arg(long, global = true)]
    embedding_provider: Option<String>,

    /// Embedding model identifier
    #[arg(long, global = true)]
    embedding_model: Option<String>,

    /// Guideline chunk size in characters
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Overlap between consecutive guideline chunks
    #[arg(long, global = true)]
    chunk_overlap: Option<usize>,

    /// Number of items retrieved per question
    #[arg(short = 'k', long, global = true)]
    top_k: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            provider: self.provider.clone(),
            model: self.model.clone(),
            embedding_provider: self.embedding_provider.clone(),
            embedding_model: self.embedding_model.clone(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
            verbose: self.verbose,
            no_color: self.no_color,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer one question
    Ask(AskCommand),

    /// Answer questions read from stdin until "exit"
    Chat(ChatCommand),

    /// Build the knowledge base and print build statistics
    Build(BuildCommand),

    /// Show the items retrieved for a question, without calling the chat model
    Search(SearchCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let config = AppConfig::load(cli.config.as_deref())?.with_overrides(cli.overrides());

    let format = LogFormat::parse(&config.log_format).ok_or_else(|| {
        AppError::Config(format!(
            "Unknown log format: {}. Supported: pretty, json",
            config.log_format
        ))
    })?;
    logging::init_logging(config.log_level.as_deref(), config.no_color, format)?;

    tracing::info!("Estate CLI starting");
    tracing::debug!("Provider: {} ({})", config.provider, config.model);
    tracing::debug!(
        "Embeddings: {} ({})",
        config.embedding_provider,
        config.embedding_model
    );

    config.validate()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
        Commands::Build(_) => "build",
        Commands::Search(_) => "search",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Build(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
