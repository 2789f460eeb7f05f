//! Prompt builder for rendering answer templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use estate_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build the answering prompt for a question and its retrieved context.
///
/// The definition's own `system` message wins over `default_system`.
///
/// # Example
/// ```
/// use estate_prompt::{build_answer_prompt, PromptDefinition};
///
/// let def = PromptDefinition::default_answer();
/// let built = build_answer_prompt(&def, "Property ID: P1", "Anything near Velachery?", None).unwrap();
/// assert!(built.user.contains("Property ID: P1"));
/// ```
pub fn build_answer_prompt(
    definition: &PromptDefinition,
    context: &str,
    question: &str,
    default_system: Option<&str>,
) -> AppResult<BuiltPrompt> {
    let mut variables = HashMap::new();
    variables.insert("context".to_string(), context.to_string());
    variables.insert("question".to_string(), question.to_string());

    build_prompt(definition, variables, default_system)
}

/// Build a prompt from a definition and input variables.
///
/// Rendering is strict: a template referencing a variable that was not
/// supplied is an error rather than an empty substitution.
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
    default_system: Option<&str>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!(prompt_id = %definition.id, "Building prompt");

    let user = render_template(&definition.template, &variables)?;
    let system = definition
        .system
        .clone()
        .or_else(|| default_system.map(str::to_string))
        .filter(|s| !s.trim().is_empty());

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        variables,
    ))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
