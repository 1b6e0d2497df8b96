pub mod adf;
pub mod rest;
pub mod types;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{Res, Void};
use types::{CreatedIssue, JiraProject, NewIssue, RawIssue};

// Traits.

/// Generic Jira client trait that clients must implement.
///
/// This trait defines the issue-tracker calls helios needs. Implementing it
/// allows tests to substitute canned responses for the REST API.
#[async_trait]
pub trait GenericJiraClient: Send + Sync + 'static {
    /// The instance root, used to build browse links.
    fn base_url(&self) -> &str;

    /// Search issues with JQL, following pagination up to `max_results` issues.
    async fn search_issues(&self, jql: &str, max_results: u32) -> Res<Vec<RawIssue>>;

    /// List every project visible to the account.
    ///
    /// Listing failures yield an empty list rather than an error.
    async fn get_projects(&self) -> Res<Vec<JiraProject>>;

    /// Get a single issue, including its comments.
    async fn get_issue(&self, issue_key: &str) -> Res<RawIssue>;

    /// Create a new issue.
    async fn create_issue(&self, issue: &NewIssue) -> Res<CreatedIssue>;

    /// Add a plain-text comment to an issue.
    async fn add_comment(&self, issue_key: &str, comment: &str) -> Void;
}

// Structs.

/// Jira client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct JiraClient {
    inner: Arc<dyn GenericJiraClient>,
}

impl Deref for JiraClient {
    type Target = dyn GenericJiraClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl JiraClient {
    pub fn new(inner: Arc<dyn GenericJiraClient>) -> Self {
        Self { inner }
    }

    /// Browse link for an issue key.
    pub fn browse_url(&self, issue_key: &str) -> String {
        format!("{}/browse/{}", self.base_url().trim_end_matches('/'), issue_key)
    }
}
