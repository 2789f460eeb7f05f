//! Prompt templates for the estate RAG tool.
//!
//! Holds the built-in answering prompt, loads optional YAML overrides, and
//! renders them with Handlebars.

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_answer_prompt, build_prompt};
pub use loader::{load_answer_prompt, load_prompt, PROMPTS_DIR};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, ANSWER_PROMPT_ID};
