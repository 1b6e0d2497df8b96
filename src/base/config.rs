//! Load configuration via `config` crate with env-override support.

use std::{fmt, ops::Deref, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};

use super::types::Res;

/// Default Google OAuth client secrets file.
fn default_google_drive_credentials_file() -> String {
    "credentials.json".to_string()
}

/// Default cached OAuth token file.
fn default_google_drive_token_file() -> String {
    "token.json".to_string()
}

/// Default LLM provider.
fn default_llm_provider() -> String {
    "gemini".to_string()
}

/// Default wait for the user to finish Google consent, in seconds.
fn default_google_auth_timeout_secs() -> u64 {
    120
}

/// Default LLM call timeout, in seconds.
fn default_llm_timeout_secs() -> u64 {
    120
}

/// Default upper bound on issues fetched per project.
fn default_jira_max_results() -> u32 {
    500
}

fn default_bind_address() -> String {
    "127.0.0.1:8501".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_google_drive_base_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_google_docs_base_url() -> String {
    "https://docs.googleapis.com/v1".to_string()
}

/// Default Gemini model (Gemini 2.0).
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Default OpenAI model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Configuration for the helios application.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Jira instance URL, e.g. `https://company.atlassian.net` (`JIRA_BASE_URL`).
    #[serde(default)]
    pub jira_base_url: String,
    /// Jira account email (`JIRA_EMAIL`).
    #[serde(default)]
    pub jira_email: String,
    /// Jira API token (`JIRA_API_TOKEN`).
    #[serde(default)]
    pub jira_api_token: String,
    /// Maximum number of issues fetched per project (`JIRA_MAX_RESULTS`).
    #[serde(default = "default_jira_max_results")]
    pub jira_max_results: u32,
    /// Path to the OAuth2 client secrets JSON (`GOOGLE_DRIVE_CREDENTIALS_FILE`).
    #[serde(default = "default_google_drive_credentials_file")]
    pub google_drive_credentials_file: String,
    /// Path where the OAuth2 token is cached (`GOOGLE_DRIVE_TOKEN_FILE`).
    #[serde(default = "default_google_drive_token_file")]
    pub google_drive_token_file: String,
    /// How long the browser consent flow may wait for the redirect (`GOOGLE_AUTH_TIMEOUT_SECS`).
    #[serde(default = "default_google_auth_timeout_secs")]
    pub google_auth_timeout_secs: u64,
    /// Drive v3 API root (`GOOGLE_DRIVE_BASE_URL`).
    #[serde(default = "default_google_drive_base_url")]
    pub google_drive_base_url: String,
    /// Docs v1 API root (`GOOGLE_DOCS_BASE_URL`).
    #[serde(default = "default_google_docs_base_url")]
    pub google_docs_base_url: String,
    /// LLM provider: `gemini`, `openai`, or anything else to auto-detect (`LLM_PROVIDER`).
    #[serde(default = "default_llm_provider")]
    pub llm_provider: String,
    /// Model override (`LLM_MODEL`).
    #[serde(default)]
    pub llm_model: Option<String>,
    /// Upper bound on a single LLM call (`LLM_TIMEOUT_SECS`).
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
    /// Google Gemini API key (`GEMINI_API_KEY`).
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    /// Gemini API root (`GEMINI_BASE_URL`).
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,
    /// OpenAI API key (`OPENAI_API_KEY`).
    #[serde(default)]
    pub openai_api_key: Option<String>,
    /// OpenAI API root (`OPENAI_BASE_URL`).
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    /// Address the web UI listens on (`BIND_ADDRESS`).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            jira_base_url: String::new(),
            jira_email: String::new(),
            jira_api_token: String::new(),
            jira_max_results: default_jira_max_results(),
            google_drive_credentials_file: default_google_drive_credentials_file(),
            google_drive_token_file: default_google_drive_token_file(),
            google_auth_timeout_secs: default_google_auth_timeout_secs(),
            google_drive_base_url: default_google_drive_base_url(),
            google_docs_base_url: default_google_docs_base_url(),
            llm_provider: default_llm_provider(),
            llm_model: None,
            llm_timeout_secs: default_llm_timeout_secs(),
            gemini_api_key: None,
            gemini_base_url: default_gemini_base_url(),
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            bind_address: default_bind_address(),
        }
    }
}

impl Config {
    pub fn load(explicit_path: Option<&Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default());

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        if result.llm_timeout_secs < 1 {
            return Err(anyhow::anyhow!("LLM timeout must be at least 1 second."));
        }

        if result.google_auth_timeout_secs < 1 {
            return Err(anyhow::anyhow!("Google authorization timeout must be at least 1 second."));
        }

        if result.jira_max_results < 1 || result.jira_max_results > 5000 {
            return Err(anyhow::anyhow!("Jira max results must be between 1 and 5000."));
        }

        Ok(result)
    }

    /// Resolve which LLM provider, key, and model to use.
    ///
    /// Returns `None` when no usable API key is configured.
    pub fn llm_settings(&self) -> Option<LlmSettings> {
        let gemini_key = non_empty(&self.gemini_api_key);
        let openai_key = non_empty(&self.openai_api_key);

        let (provider, api_key) = match self.llm_provider.to_lowercase().as_str() {
            "gemini" => (LlmProvider::Gemini, gemini_key?),
            "openai" => (LlmProvider::OpenAi, openai_key?),
            _ => match (gemini_key, openai_key) {
                (Some(key), _) => (LlmProvider::Gemini, key),
                (None, Some(key)) => (LlmProvider::OpenAi, key),
                (None, None) => return None,
            },
        };

        let model = non_empty(&self.llm_model).unwrap_or_else(|| provider.default_model().to_string());

        Some(LlmSettings { provider, api_key, model })
    }

    /// Problems with the Jira settings; empty when Jira is usable.
    pub fn jira_issues(&self) -> Vec<ConfigIssue> {
        let checks = [
            ("JIRA_BASE_URL", &self.jira_base_url, "your-domain"),
            ("JIRA_EMAIL", &self.jira_email, "your-email"),
            ("JIRA_API_TOKEN", &self.jira_api_token, "your-api-token"),
        ];

        checks
            .into_iter()
            .filter_map(|(key, value, placeholder)| {
                if value.trim().is_empty() {
                    Some(ConfigIssue { key, kind: ConfigIssueKind::Missing })
                } else if value.contains(placeholder) {
                    Some(ConfigIssue { key, kind: ConfigIssueKind::Placeholder })
                } else {
                    None
                }
            })
            .collect()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Supported hosted LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    Gemini,
    OpenAi,
}

impl LlmProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => DEFAULT_GEMINI_MODEL,
            LlmProvider::OpenAi => DEFAULT_OPENAI_MODEL,
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::Gemini => write!(f, "gemini"),
            LlmProvider::OpenAi => write!(f, "openai"),
        }
    }
}

/// Resolved LLM settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub api_key: String,
    pub model: String,
}

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub key: &'static str,
    pub kind: ConfigIssueKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueKind {
    Missing,
    Placeholder,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConfigIssueKind::Missing => write!(f, "{} is not set", self.key),
            ConfigIssueKind::Placeholder => write!(f, "{} still contains a placeholder value", self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn config_with(f: impl FnOnce(&mut ConfigInner)) -> Config {
        let mut inner = ConfigInner::default();
        f(&mut inner);
        inner.into()
    }

    #[test]
    fn test_llm_settings_gemini_default_model() {
        let config = config_with(|c| c.gemini_api_key = Some("g-key".to_string()));

        let settings = config.llm_settings().unwrap();

        assert_eq!(settings.provider, LlmProvider::Gemini);
        assert_eq!(settings.api_key, "g-key");
        assert_eq!(settings.model, DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn test_llm_settings_explicit_provider_without_key() {
        let config = config_with(|c| {
            c.llm_provider = "openai".to_string();
            c.gemini_api_key = Some("g-key".to_string());
        });

        assert!(config.llm_settings().is_none());
    }

    #[test]
    fn test_llm_settings_auto_detect_prefers_gemini() {
        let config = config_with(|c| {
            c.llm_provider = "auto".to_string();
            c.gemini_api_key = Some("g-key".to_string());
            c.openai_api_key = Some("o-key".to_string());
        });

        assert_eq!(config.llm_settings().unwrap().provider, LlmProvider::Gemini);

        let config = config_with(|c| {
            c.llm_provider = "auto".to_string();
            c.openai_api_key = Some("o-key".to_string());
            c.llm_model = Some("gpt-4o".to_string());
        });

        let settings = config.llm_settings().unwrap();
        assert_eq!(settings.provider, LlmProvider::OpenAi);
        assert_eq!(settings.model, "gpt-4o");
    }

    #[test]
    fn test_llm_settings_blank_key_is_missing() {
        let config = config_with(|c| c.gemini_api_key = Some("   ".to_string()));

        assert!(config.llm_settings().is_none());
    }

    #[test]
    fn test_jira_issues() {
        let config = config_with(|c| {
            c.jira_base_url = "https://your-domain.atlassian.net".to_string();
            c.jira_email = "dev@example.com".to_string();
        });

        let issues = config.jira_issues();

        assert_eq!(
            issues,
            vec![
                ConfigIssue { key: "JIRA_BASE_URL", kind: ConfigIssueKind::Placeholder },
                ConfigIssue { key: "JIRA_API_TOKEN", kind: ConfigIssueKind::Missing },
            ]
        );
        assert_eq!(issues[1].to_string(), "JIRA_API_TOKEN is not set");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
jira_base_url = "https://acme.atlassian.net"
jira_email = "pm@acme.test"
jira_api_token = "secret"
jira_max_results = 50
bind_address = "0.0.0.0:9000"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.jira_base_url, "https://acme.atlassian.net");
        assert_eq!(config.jira_max_results, 50);
        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert!(config.jira_issues().is_empty());
    }

    #[test]
    fn test_load_rejects_out_of_range_max_results() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "jira_max_results = 0").unwrap();

        assert!(Config::load(Some(file.path())).is_err());
    }
}
