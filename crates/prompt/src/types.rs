//! Prompt types for the estate RAG tool.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of the built-in answering prompt.
pub const ANSWER_PROMPT_ID: &str = "rag.answer";

const ANSWER_TEMPLATE: &str = "You are a real estate assistant. Here is some context from our \
property listings and community guidelines:

{{context}}

User query: {{question}}

Please provide a clear and structured response based on the context. If the query is about \
community guidelines, cite the relevant sections and subsections.";

/// A prompt definition, either built in or loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Optional system message; overrides the configured one when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Template string with Handlebars syntax
    pub template: String,
}

impl PromptDefinition {
    /// The built-in retrieval-augmented answering prompt.
    ///
    /// Variables: `context` (rendered retrieved items), `question`.
    pub fn default_answer() -> Self {
        Self {
            id: ANSWER_PROMPT_ID.to_string(),
            title: "Answer a property question from retrieved context".to_string(),
            api_version: "1.0".to_string(),
            created_by: "builtin".to_string(),
            system: None,
            template: ANSWER_TEMPLATE.to_string(),
        }
    }
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Template variables that were resolved
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: HashMap<String, String>,
}

impl BuiltPrompt {
    /// Create a new built prompt.
    pub fn new(
        system: Option<String>,
        user: String,
        source_prompt_id: String,
        resolved_variables: HashMap<String, String>,
    ) -> Self {
        Self {
            system,
            user,
            metadata: BuiltPromptMetadata {
                source_prompt_id,
                resolved_variables,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: rag.answer
title: Terse answers
apiVersion: "1.0"
createdBy: test
system: "Answer in one sentence."
template: "{{context}}\n\nQ: {{question}}"
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "rag.answer");
        assert_eq!(def.system.as_deref(), Some("Answer in one sentence."));
        assert!(def.template.contains("{{question}}"));
    }

    #[test]
    fn test_default_answer_mentions_both_variables() {
        let def = PromptDefinition::default_answer();
        assert_eq!(def.id, ANSWER_PROMPT_ID);
        assert!(def.template.contains("{{context}}"));
        assert!(def.template.contains("{{question}}"));
    }
}
