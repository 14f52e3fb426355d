//! Completion-service seam and the remote enrichment calls built on it.
//!
//! [`CompletionService`] is the black-box contract: one request in, free text
//! out, or a [`RemoteError`]. [`LlmCompletionService`] implements it over an
//! `edgequake_llm` provider; tests substitute a scripted implementation.
//!
//! [`RemoteEnricher`] turns the three remote tasks (markdown, analysis,
//! configured field extraction) into requests and pushes every attempt
//! through the shared [`Dispatcher`]. Empty and unparseable answers count as
//! failed attempts, so they are retried like transport errors. All prompt
//! wording lives in [`crate::prompts`].

use crate::error::RemoteError;
use crate::instructions::DocumentInstructions;
use crate::pipeline::analyze::AnalysisResult;
use crate::pipeline::classify::ClassificationResult;
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::postprocess;
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Appended to prompt text cut at the configured maximum length.
const TRUNCATION_NOTICE: &str = "\n\n[... text truncated ...]";

/// One call to the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

/// A text-completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, RemoteError>;
}

/// [`CompletionService`] backed by an `edgequake_llm` provider.
pub struct LlmCompletionService {
    provider: Arc<dyn LLMProvider>,
}

impl LlmCompletionService {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CompletionService for LlmCompletionService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, RemoteError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(request.system_prompt.as_str()),
            ChatMessage::user(request.user_prompt.as_str()),
        ];
        let options = build_options(request);

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                debug!(
                    "Completion: {} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                if response.content.trim().is_empty() {
                    Err(RemoteError::EmptyContent)
                } else {
                    Ok(response.content)
                }
            }
            Err(e) => Err(RemoteError::from(e)),
        }
    }
}

fn build_options(request: &CompletionRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}

/// Remote markdown, analysis and field extraction through the dispatcher.
pub struct RemoteEnricher {
    service: Arc<dyn CompletionService>,
    dispatcher: Arc<Dispatcher>,
    temperature: f32,
    max_text_length: usize,
}

impl RemoteEnricher {
    pub fn new(
        service: Arc<dyn CompletionService>,
        dispatcher: Arc<Dispatcher>,
        temperature: f32,
        max_text_length: usize,
    ) -> Self {
        Self {
            service,
            dispatcher,
            temperature,
            max_text_length,
        }
    }

    fn request(&self, system_prompt: &str, user_prompt: String, max_tokens: usize) -> CompletionRequest {
        CompletionRequest {
            system_prompt: system_prompt.to_string(),
            user_prompt,
            max_tokens,
            temperature: self.temperature,
        }
    }

    /// Convert extracted text to Markdown. The answer is cleaned before it
    /// is returned.
    pub async fn render_markdown(
        &self,
        text: &str,
        classification: &ClassificationResult,
        instructions: Option<&str>,
        max_tokens: usize,
    ) -> Result<String, RemoteError> {
        let text = truncate_for_prompt(text, self.max_text_length);
        let request = self.request(
            prompts::MARKDOWN_SYSTEM_PROMPT,
            prompts::markdown_user_prompt(&text, &classification.summary(), instructions),
            max_tokens,
        );
        let service = &self.service;
        let request = &request;
        self.dispatcher
            .submit("markdown", move || async move {
                let content = service.complete(request).await?;
                let cleaned = postprocess::clean_markdown(&content);
                if cleaned.trim().is_empty() {
                    Err(RemoteError::EmptyContent)
                } else {
                    Ok(cleaned)
                }
            })
            .await
    }

    /// Semantic analysis, parsed from the JSON answer.
    pub async fn analyze(&self, text: &str, max_tokens: usize) -> Result<AnalysisResult, RemoteError> {
        let text = truncate_for_prompt(text, self.max_text_length);
        let request = self.request(
            prompts::ANALYSIS_SYSTEM_PROMPT,
            prompts::analysis_user_prompt(&text),
            max_tokens,
        );
        let service = &self.service;
        let request = &request;
        self.dispatcher
            .submit("analysis", move || async move {
                let content = service.complete(request).await?;
                parse_json::<AnalysisResult>(&content)
            })
            .await
    }

    /// Run a configured extraction and return its JSON answer.
    pub async fn extract_fields(
        &self,
        text: &str,
        instructions: &DocumentInstructions,
        max_tokens: usize,
    ) -> Result<serde_json::Value, RemoteError> {
        let text = truncate_for_prompt(text, self.max_text_length);
        let request = self.request(
            prompts::FIELD_EXTRACTION_SYSTEM_PROMPT,
            prompts::field_extraction_user_prompt(&text, &instructions.prompt, &instructions.example),
            max_tokens,
        );
        let service = &self.service;
        let request = &request;
        self.dispatcher
            .submit("field extraction", move || async move {
                let content = service.complete(request).await?;
                parse_json::<serde_json::Value>(&content)
            })
            .await
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_for_prompt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_NOTICE),
        None => text.to_string(),
    }
}

/// Parse a JSON answer, tolerating code fences and surrounding prose.
pub fn parse_json<T: DeserializeOwned>(content: &str) -> Result<T, RemoteError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(RemoteError::EmptyContent);
    }
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.trim_end().strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    if let Ok(value) = serde_json::from_str(unfenced) {
        return Ok(value);
    }
    let start = unfenced.find(['{', '[']);
    let end = unfenced.rfind(['}', ']']);
    match (start, end) {
        (Some(s), Some(e)) if e > s => serde_json::from_str(&unfenced[s..=e])
            .map_err(|err| RemoteError::Malformed(format!("invalid JSON: {err}"))),
        _ => Err(RemoteError::Malformed("answer contains no JSON".into())),
    }
}
