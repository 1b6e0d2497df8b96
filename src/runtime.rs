//! Runtime services and shared state for helios.

use tracing::{info, instrument, warn};

use crate::{
    base::{
        config::{Config, ConfigIssueKind},
        types::Res,
    },
    service::{docs::DocsClient, jira::JiraClient, llm::LlmClient},
};

/// Warning shown when no LLM key is configured.
pub const LLM_MISSING_WARNING: &str = "LLM not configured. Responses will be basic summaries without AI enhancement. Set GEMINI_API_KEY (or OPENAI_API_KEY) to enable it.";

/// Runtime service context that can be shared across the application.
///
/// This struct holds the configuration and the service clients. Jira is
/// required; Drive and the LLM are optional and their absence is recorded in
/// `warnings`. It is designed to be trivially cloneable, allowing it to be
/// passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The Jira client instance.
    pub jira: JiraClient,
    /// The Drive/Docs client instance, if Google credentials are usable.
    pub docs: Option<DocsClient>,
    /// The LLM client instance, if an API key is configured.
    pub llm: Option<LlmClient>,
    /// Non-fatal initialization problems, for display.
    pub warnings: Vec<String>,
}

impl Runtime {
    /// Create a new runtime instance.
    ///
    /// Fails when the Jira settings are missing or still hold placeholders.
    /// Google authorization may run the interactive consent flow the first
    /// time it is used.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        check_jira_config(&config)?;

        // Initialize the Jira client.
        let jira = JiraClient::rest(&config)?;

        // Initialize the Drive/Docs client.
        let mut warnings = Vec::new();
        let docs = match DocsClient::google(&config).await {
            Ok(docs) => Some(docs),
            Err(err) => {
                warnings.push(format!("Google Drive unavailable, meeting notes will be skipped: {err}"));
                None
            }
        };

        // Initialize the LLM client.
        let llm = match config.llm_settings() {
            Some(settings) => {
                info!("Using {} model `{}`", settings.provider, settings.model);
                Some(LlmClient::from_settings(&settings, &config)?)
            }
            None => None,
        };

        let mut runtime = Self::from_parts(config, jira, docs, llm);
        warnings.append(&mut runtime.warnings);
        runtime.warnings = warnings;

        for warning in &runtime.warnings {
            warn!("{warning}");
        }

        Ok(runtime)
    }

    /// Assemble a runtime from already-built clients.
    pub fn from_parts(config: Config, jira: JiraClient, docs: Option<DocsClient>, llm: Option<LlmClient>) -> Self {
        let mut warnings = Vec::new();

        if llm.is_none() {
            warnings.push(LLM_MISSING_WARNING.to_string());
        }

        Self { config, jira, docs, llm, warnings }
    }
}

/// Turn Jira configuration problems into a single user-facing error.
pub fn check_jira_config(config: &Config) -> Res<()> {
    let issues = config.jira_issues();

    if issues.is_empty() {
        return Ok(());
    }

    let placeholders = issues.iter().filter(|i| i.kind == ConfigIssueKind::Placeholder).map(|i| i.key).collect::<Vec<_>>();

    if !placeholders.is_empty() {
        return Err(anyhow::anyhow!(
            "Jira credentials contain placeholder values ({}). Please update your `.env` file with actual values.",
            placeholders.join(", ")
        ));
    }

    Err(anyhow::anyhow!("Jira configuration incomplete. Please set JIRA_BASE_URL, JIRA_EMAIL, and JIRA_API_TOKEN in your `.env` file."))
}
