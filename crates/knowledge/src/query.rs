//! Question answering over a ready knowledge base.
//!
//! Pipeline: readiness check, embed the question, nearest-neighbour search,
//! render the hits as context, render the answer prompt, chat completion.

use crate::base::KnowledgeBase;
use crate::types::{ItemSource, SearchHit};
use crate::vector_index::VectorIndex;
use estate_core::{AppConfig, AppError, AppResult};
use estate_llm::{complete_with_retry, LlmClient, LlmRequest, RetryPolicy};
use estate_prompt::{build_answer_prompt, PromptDefinition};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Results retrieved when no `top_k` is configured.
pub const DEFAULT_TOP_K: usize = 5;

/// An answer together with the items it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub model: String,
    pub sources: Vec<SearchHit>,
}

/// Answers questions against one knowledge base.
pub struct QueryEngine<'kb> {
    knowledge: &'kb KnowledgeBase,
    llm: Arc<dyn LlmClient>,
    model: String,
    system_prompt: Option<String>,
    prompt: PromptDefinition,
    top_k: usize,
    retry: RetryPolicy,
}

impl<'kb> QueryEngine<'kb> {
    pub fn new(knowledge: &'kb KnowledgeBase, llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            knowledge,
            llm,
            model: model.into(),
            system_prompt: None,
            prompt: PromptDefinition::default_answer(),
            top_k: DEFAULT_TOP_K,
            retry: RetryPolicy::default(),
        }
    }

    /// Engine using the configured model, system prompt, `top_k` and retries.
    pub fn from_config(
        knowledge: &'kb KnowledgeBase,
        llm: Arc<dyn LlmClient>,
        config: &AppConfig,
    ) -> Self {
        Self::new(knowledge, llm, config.model.clone())
            .with_system_prompt(config.system_prompt.clone())
            .with_top_k(config.top_k)
            .with_retry(RetryPolicy::new(
                config.max_attempts,
                Duration::from_millis(config.initial_backoff_ms),
            ))
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_prompt(mut self, prompt: PromptDefinition) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The `top_k` items nearest to `question`.
    ///
    /// Fails with `AppError::NotReady` before touching the network when the
    /// knowledge base is not ready.
    pub async fn retrieve(&self, question: &str) -> AppResult<Vec<SearchHit>> {
        let store = self.knowledge.store()?;

        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Knowledge("Question is empty".to_string()));
        }

        let query = self.knowledge.embeddings().embed(question).await?;
        let hits = store.search(&query, self.top_k)?;

        tracing::debug!(
            "Retrieved {} items for question ({} property, {} guideline)",
            hits.len(),
            hits.iter().filter(|h| h.item.as_property().is_some()).count(),
            hits.iter().filter(|h| h.item.as_guideline().is_some()).count()
        );

        Ok(hits)
    }

    /// Answer `question`, returning the model's text verbatim.
    pub async fn answer(&self, question: &str) -> AppResult<String> {
        Ok(self.ask(question).await?.answer)
    }

    /// Answer `question` and keep the retrieved sources.
    pub async fn ask(&self, question: &str) -> AppResult<Answer> {
        let sources = self.retrieve(question).await?;
        let context = build_context(&sources);

        let built = build_answer_prompt(
            &self.prompt,
            &context,
            question.trim(),
            self.system_prompt.as_deref(),
        )?;

        let mut request = LlmRequest::new(built.user, self.model.clone());
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        tracing::info!(
            "Generating answer with {} ({} context items)",
            self.llm.provider_name(),
            sources.len()
        );

        let response = complete_with_retry(self.llm.as_ref(), &request, &self.retry).await?;

        Ok(Answer {
            question: question.trim().to_string(),
            answer: response.content,
            model: response.model,
            sources,
        })
    }
}

/// Render retrieved items as the prompt's context block.
///
/// Properties come first, then guideline excerpts, each group in rank order.
pub fn build_context(hits: &[SearchHit]) -> String {
    let properties = hits.iter().filter(|h| matches!(h.item, ItemSource::Property(_)));
    let guidelines = hits.iter().filter(|h| matches!(h.item, ItemSource::Guideline(_)));

    properties
        .chain(guidelines)
        .map(|hit| hit.item.render())
        .collect::<Vec<_>>()
        .join("\n\n")
}
