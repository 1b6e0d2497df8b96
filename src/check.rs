//! Configuration report for `helios check`.

use std::{fmt, path::Path};

use crate::base::config::{Config, ConfigIssueKind};

/// One checked setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckLine {
    pub ok: bool,
    pub label: String,
    pub detail: String,
}

/// Result of checking every setting helios depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub jira: Vec<CheckLine>,
    pub google: Vec<CheckLine>,
    pub llm: Vec<CheckLine>,
    /// Problems that stop helios from answering questions.
    pub issues: Vec<String>,
    /// Problems that only disable a feature.
    pub warnings: Vec<String>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

fn line(ok: bool, label: &str, detail: impl Into<String>) -> CheckLine {
    CheckLine {
        ok,
        label: label.to_string(),
        detail: detail.into(),
    }
}

/// Check the configuration without contacting any service.
pub fn check_config(config: &Config) -> CheckReport {
    let mut report = CheckReport::default();
    let jira_issues = config.jira_issues();

    for (key, value, secret) in [
        ("JIRA_BASE_URL", &config.jira_base_url, false),
        ("JIRA_EMAIL", &config.jira_email, false),
        ("JIRA_API_TOKEN", &config.jira_api_token, true),
    ] {
        match jira_issues.iter().find(|issue| issue.key == key) {
            Some(issue) => {
                let detail = match issue.kind {
                    ConfigIssueKind::Missing => "NOT SET".to_string(),
                    ConfigIssueKind::Placeholder if secret => "SET (contains placeholder)".to_string(),
                    ConfigIssueKind::Placeholder => format!("{value} (contains placeholder)"),
                };
                report.jira.push(line(false, key, detail));
                report.issues.push(issue.to_string());
            }
            None => report.jira.push(line(true, key, if secret { "SET".to_string() } else { value.clone() })),
        }
    }

    let credentials = Path::new(&config.google_drive_credentials_file);
    if credentials.exists() {
        report.google.push(line(true, "Credentials file", format!("{} found", credentials.display())));
    } else {
        report.google.push(line(false, "Credentials file", format!("{} not found", credentials.display())));
        report.warnings.push(format!("{} not found; meeting notes will be skipped", credentials.display()));
    }

    let token = Path::new(&config.google_drive_token_file);
    if token.exists() {
        report.google.push(line(true, "Token file", format!("{} found", token.display())));
    } else {
        report.google.push(line(false, "Token file", format!("{} not found (created on first authorization)", token.display())));
    }

    match config.llm_settings() {
        Some(settings) => report.llm.push(line(true, "Provider", format!("{} ({})", settings.provider, settings.model))),
        None => {
            report.llm.push(line(false, "Provider", "no API key set"));
            report.warnings.push("GEMINI_API_KEY / OPENAI_API_KEY not set; AI features will be limited".to_string());
        }
    }

    report
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (title, lines) in [("JIRA CONFIGURATION", &self.jira), ("GOOGLE DRIVE", &self.google), ("LLM (optional)", &self.llm)] {
            writeln!(f, "{title}:")?;
            for l in lines {
                writeln!(f, "  {} {}: {}", if l.ok { "✅" } else { "❌" }, l.label, l.detail)?;
            }
            writeln!(f)?;
        }

        if !self.issues.is_empty() {
            writeln!(f, "Found {} issue(s) that need to be fixed:", self.issues.len())?;
            for (i, issue) in self.issues.iter().enumerate() {
                writeln!(f, "  {}. {issue}", i + 1)?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f, "Found {} warning(s):", self.warnings.len())?;
            for (i, warning) in self.warnings.iter().enumerate() {
                writeln!(f, "  {}. {warning}", i + 1)?;
            }
        }

        if self.is_ok() && self.warnings.is_empty() {
            writeln!(f, "All settings look good.")?;
        }

        Ok(())
    }
}
