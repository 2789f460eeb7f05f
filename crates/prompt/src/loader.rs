//! Prompt loader for YAML prompt overrides.

use crate::types::PromptDefinition;
use estate_core::{AppError, AppResult};
use std::path::Path;

/// Directory, relative to the working directory, searched for prompt overrides.
pub const PROMPTS_DIR: &str = ".estate/prompts";

/// Load a prompt definition by ID from `prompts_dir/<id>.yml`.
///
/// # Example
/// ```no_run
/// use estate_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new(".estate/prompts"), "rag.answer")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir.join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Load the answering prompt, falling back to the built-in one when no
/// override file exists. A present but invalid override is still an error.
pub fn load_answer_prompt(prompts_dir: &Path) -> AppResult<PromptDefinition> {
    let default = PromptDefinition::default_answer();
    let prompt_file = prompts_dir.join(format!("{}.yml", default.id));

    if prompt_file.exists() {
        load_prompt(prompts_dir, &default.id)
    } else {
        tracing::debug!("No prompt override at {:?}, using built-in", prompt_file);
        Ok(default)
    }
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    if !def.template.contains("question") {
        return Err(AppError::Prompt(format!(
            "Prompt {} never references {{{{question}}}}",
            def.id
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, id: &str, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(format!("{}.yml", id)), content).unwrap();
    }

    fn valid_prompt(id: &str) -> String {
        format!(
            r#"
id: {}
title: "Test Prompt"
apiVersion: "1.0"
createdBy: test
template: "Context: {{{{context}}}} Question: {{{{question}}}}"
"#,
            id
        )
    }

    #[test]
    fn test_load_valid_prompt() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "test.prompt", &valid_prompt("test.prompt"));

        let prompt = load_prompt(temp_dir.path(), "test.prompt").unwrap();
        assert_eq!(prompt.id, "test.prompt");
        assert_eq!(prompt.title, "Test Prompt");
        assert!(prompt.template.contains("{{question}}"));
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_prompt(temp_dir.path(), "nonexistent");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "invalid", "invalid: yaml: content:");

        let result = load_prompt(temp_dir.path(), "invalid");
        assert!(result.is_err());
    }

    #[test]
    fn test_template_without_question_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "no.question",
            "id: no.question\ntitle: T\napiVersion: \"1.0\"\ntemplate: \"{{context}}\"\n",
        );

        let result = load_prompt(temp_dir.path(), "no.question");
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_answer_prompt_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = load_answer_prompt(&temp_dir.path().join("missing")).unwrap();
        assert_eq!(prompt.id, "rag.answer");
        assert_eq!(prompt.created_by, "builtin");
    }

    #[test]
    fn test_answer_prompt_override() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "rag.answer", &valid_prompt("rag.answer"));

        let prompt = load_answer_prompt(temp_dir.path()).unwrap();
        assert_eq!(prompt.title, "Test Prompt");
    }
}
