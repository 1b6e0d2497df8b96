pub mod gemini;
pub mod openai;

use std::{future::Future, ops::Deref, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument};

use crate::base::{
    config::{Config, LlmProvider, LlmSettings},
    prompts,
    types::{ActionItem, Res, TicketStructure},
};
use crate::service::jira::{adf, types::RawIssue};

// Types.

/// A single prompt sent to a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmRequest {
    /// Optional system directive.
    pub system: Option<String>,
    /// The user prompt.
    pub prompt: String,
    /// Sampling temperature; provider default when `None`.
    pub temperature: Option<f32>,
    /// Output token cap; provider default when `None`.
    pub max_output_tokens: Option<u32>,
    /// Ask the provider for a JSON response.
    pub json: bool,
}

// Traits.

/// Generic LLM client trait that clients must implement.
///
/// This trait defines the one call helios makes to a hosted model: send a
/// prompt, get text back. Implementing it allows different providers (or test
/// doubles) to be used interchangeably.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// The provider behind this client.
    fn provider(&self) -> LlmProvider;

    /// The model name requests are sent to.
    fn model(&self) -> &str;

    /// Generate text for the request.
    async fn generate(&self, request: &LlmRequest) -> Res<String>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }

    /// Create the client for the resolved provider.
    pub fn from_settings(settings: &LlmSettings, config: &Config) -> Res<Self> {
        match settings.provider {
            LlmProvider::Gemini => LlmClient::gemini(settings, config),
            LlmProvider::OpenAi => Ok(LlmClient::openai(settings, config)),
        }
    }

    /// Summarize text in roughly `max_words` words.
    #[instrument(skip_all)]
    pub async fn generate_summary(&self, text: &str, max_words: usize) -> Res<String> {
        let request = LlmRequest {
            system: Some(prompts::SUMMARY_SYSTEM_DIRECTIVE.to_string()),
            prompt: prompts::summary_prompt(text, max_words),
            temperature: Some(0.3),
            max_output_tokens: Some(500),
            json: false,
        };

        let summary = self.generate(&request).await.map_err(|err| anyhow::anyhow!("Failed to generate summary: {err}"))?;

        Ok(summary.trim().to_string())
    }

    /// Extract action items from a meeting summary.
    #[instrument(skip_all)]
    pub async fn extract_action_items(&self, meeting_summary: &str) -> Res<Vec<ActionItem>> {
        let request = LlmRequest {
            system: Some(prompts::ACTION_ITEMS_SYSTEM_DIRECTIVE.to_string()),
            prompt: prompts::action_items_prompt(meeting_summary),
            temperature: Some(0.2),
            max_output_tokens: None,
            json: true,
        };

        let content = self.generate(&request).await.map_err(|err| anyhow::anyhow!("Failed to extract action items: {err}"))?;
        let items = parse_action_items(&content).map_err(|err| anyhow::anyhow!("Failed to extract action items: {err}"))?;

        info!("Extracted {} action items", items.len());

        Ok(items)
    }

    /// Status summary of a Jira issue, including its latest comments.
    #[instrument(skip_all, fields(issue = %issue.key))]
    pub async fn generate_issue_summary(&self, issue: &RawIssue) -> Res<String> {
        let request = LlmRequest {
            system: Some(prompts::ISSUE_SUMMARY_SYSTEM_DIRECTIVE.to_string()),
            prompt: prompts::issue_summary_prompt(&issue_context(issue)),
            temperature: Some(0.3),
            max_output_tokens: Some(800),
            json: false,
        };

        let summary = self.generate(&request).await.map_err(|err| anyhow::anyhow!("Failed to generate issue summary: {err}"))?;

        Ok(summary.trim().to_string())
    }

    /// Suggest how action items should be structured as Jira tickets.
    #[instrument(skip_all)]
    pub async fn suggest_ticket_structure(&self, action_items: &[ActionItem]) -> Res<TicketStructure> {
        let request = LlmRequest {
            system: Some(prompts::TICKET_STRUCTURE_SYSTEM_DIRECTIVE.to_string()),
            prompt: prompts::ticket_structure_prompt(&serde_json::to_string_pretty(action_items)?),
            temperature: Some(0.3),
            max_output_tokens: None,
            json: true,
        };

        let content = self.generate(&request).await.map_err(|err| anyhow::anyhow!("Failed to suggest ticket structure: {err}"))?;

        serde_json::from_str(&strip_code_fences(&content)).map_err(|err| anyhow::anyhow!("Failed to suggest ticket structure: {err}"))
    }

    /// Free-form answer to a prompt under a system directive.
    #[instrument(skip_all)]
    pub async fn answer(&self, system: &str, prompt: String) -> Res<String> {
        let request = LlmRequest {
            system: Some(system.to_string()),
            prompt,
            ..Default::default()
        };

        Ok(self.generate(&request).await?.trim().to_string())
    }
}

/// Bound a provider call by the configured timeout.
pub(crate) async fn with_timeout<T>(provider: LlmProvider, timeout: Duration, call: impl Future<Output = Res<T>>) -> Res<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("{provider} API call timed out after {}s", timeout.as_secs())),
    }
}

/// Text block describing an issue for the summary prompt.
pub fn issue_context(issue: &RawIssue) -> String {
    let fields = &issue.fields;

    let summary = fields.summary.as_deref().unwrap_or("No summary");
    let status = fields.status.as_ref().map(|s| s.name.as_str()).unwrap_or("Unknown");
    let assignee = fields.assignee.as_ref().and_then(|a| a.display_name.as_deref()).unwrap_or("Unassigned");
    let reporter = fields.reporter.as_ref().and_then(|r| r.display_name.as_deref()).unwrap_or("Unknown");
    let description = fields.description.as_ref().map(adf::extract_text).unwrap_or_default();

    let comments = fields.comment.as_ref().map(|page| page.comments.as_slice()).unwrap_or_default();
    let recent = comments[comments.len().saturating_sub(3)..]
        .iter()
        .map(|comment| {
            let author = comment.author.as_ref().and_then(|a| a.display_name.as_deref()).unwrap_or("Unknown");
            let text = comment.body.as_ref().map(adf::extract_text).unwrap_or_default();
            format!("{author}: {text}")
        })
        .collect::<Vec<_>>();

    let recent = if recent.is_empty() { "No comments".to_string() } else { recent.join("\n") };

    format!(
        "Jira Issue: {}\nTitle: {summary}\nStatus: {status}\nAssignee: {assignee}\nReporter: {reporter}\n\nDescription:\n{description}\n\nRecent Comments:\n{recent}\n",
        issue.key
    )
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(content: &str) -> String {
    let content = content.trim();

    if content.starts_with("```json") {
        content.replace("```json", "").replace("```", "").trim().to_string()
    } else if content.starts_with("```") {
        content.replace("```", "").trim().to_string()
    } else {
        content.to_string()
    }
}

/// Parse the model's action item output, tolerating the shapes models tend to return.
pub fn parse_action_items(content: &str) -> Res<Vec<ActionItem>> {
    let content = strip_code_fences(content);

    match serde_json::from_str::<Value>(&content) {
        Ok(value) => action_items_from_value(value),
        Err(err) => {
            if let Some(value) = json_span(&content, '[', ']') {
                return action_items_from_value(value);
            }

            if let Some(Value::Object(mut map)) = json_span(&content, '{', '}') {
                if let Some(items) = map.remove("action_items") {
                    return Ok(serde_json::from_value(items)?);
                }
            }

            Err(err.into())
        }
    }
}

fn action_items_from_value(value: Value) -> Res<Vec<ActionItem>> {
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        Value::Object(mut map) => {
            if let Some(items) = map.remove("action_items") {
                return Ok(serde_json::from_value(items)?);
            }

            if map.len() == 1 {
                if let Some(Value::Array(items)) = map.values().next() {
                    return Ok(serde_json::from_value(Value::Array(items.clone()))?);
                }
            }

            Ok(vec![serde_json::from_value(Value::Object(map))?])
        }
        _ => Ok(Vec::new()),
    }
}

/// The JSON value spanning the first `open` to the last `close`, if it parses.
fn json_span(content: &str, open: char, close: char) -> Option<Value> {
    let start = content.find(open)?;
    let end = content.rfind(close)?;

    if end <= start {
        return None;
    }

    serde_json::from_str(&content[start..=end]).ok()
}

// Tests.
