//! Jira Cloud REST v3 client.
//!
//! Authenticates with basic auth (account email + API token) and talks to
//! `{base_url}/rest/api/3`. Requests are issued once; errors carry the HTTP
//! status and response body so they can be shown to the user verbatim.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::base::{
    config::Config,
    types::{Res, Void},
};

use super::{
    GenericJiraClient, JiraClient, adf,
    types::{CreatedIssue, JiraProject, NewIssue, ProjectPage, RawIssue, SearchPage},
};

/// Fields requested from `search/jql`.
const SEARCH_FIELDS: &str = "key,summary,issuetype,status,assignee,created,updated,priority,description,duedate,customfield_10011";

// Extra methods on `JiraClient` applied by the REST implementation.

impl JiraClient {
    /// Creates a Jira Cloud REST client from the configuration.
    pub fn rest(config: &Config) -> Res<Self> {
        let client = RestJiraClient::new(&config.jira_base_url, &config.jira_email, &config.jira_api_token)?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Specific implementations.

/// Jira Cloud REST client implementation.
#[derive(Clone)]
pub struct RestJiraClient {
    client: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
}

impl RestJiraClient {
    /// Create a new REST client.
    #[instrument(name = "RestJiraClient::new", skip_all)]
    pub fn new(base_url: &str, email: &str, api_token: &str) -> Res<Self> {
        let client = reqwest::Client::builder().user_agent(concat!("helios/", env!("CARGO_PKG_VERSION"))).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            api_token: api_token.to_string(),
        })
    }

    /// `{base_url}/rest/api/3/{segments}`, each segment percent-encoded.
    fn endpoint_url(&self, segments: &[&str]) -> Res<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|err| anyhow::anyhow!("Invalid Jira base URL `{}`: {err}", self.base_url))?;

        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Invalid Jira base URL `{}`", self.base_url))?
            .pop_if_empty()
            .extend(["rest", "api", "3"])
            .extend(segments);

        Ok(url)
    }

    /// Issue a request against `/rest/api/3/{segments}` and decode the JSON response.
    async fn request<T: DeserializeOwned>(&self, method: Method, segments: &[&str], query: &[(&str, String)], body: Option<&Value>) -> Res<T> {
        let url = self.endpoint_url(segments)?;
        let endpoint = segments.join("/");

        let mut request = self
            .client
            .request(method.clone(), url)
            .basic_auth(&self.email, Some(&self.api_token))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| anyhow::anyhow!("Jira API request failed: {err}"))?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(anyhow::anyhow!("Jira API request failed: {method} {endpoint} returned {status}: {text}"));
        }

        debug!("Jira {method} {endpoint} returned {} bytes", text.len());

        let text = if text.trim().is_empty() { "null" } else { text.as_str() };

        Ok(serde_json::from_str(text)?)
    }

    /// Page through `/project/search` by `startAt`.
    async fn search_projects(&self) -> Res<Vec<JiraProject>> {
        let mut projects = Vec::new();

        loop {
            let query = [("startAt", projects.len().to_string())];
            let page: ProjectPage = self.request(Method::GET, &["project", "search"], &query, None).await?;
            let fetched = page.values.len();

            projects.extend(page.values);

            let reached_total = page.total.is_some_and(|total| projects.len() >= total);
            if page.is_last || fetched == 0 || reached_total {
                break;
            }
        }

        Ok(projects)
    }
}

#[async_trait]
impl GenericJiraClient for RestJiraClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(name = "RestJiraClient::search_issues", skip(self))]
    async fn search_issues(&self, jql: &str, max_results: u32) -> Res<Vec<RawIssue>> {
        let max = max_results as usize;
        let mut issues = Vec::new();
        let mut next_page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("jql", jql.to_string()),
                ("maxResults", max_results.to_string()),
                ("fields", SEARCH_FIELDS.to_string()),
                ("expand", "names,schema".to_string()),
            ];

            if let Some(token) = &next_page_token {
                query.push(("nextPageToken", token.clone()));
            }

            let page: SearchPage = self.request(Method::GET, &["search", "jql"], &query, None).await?;
            issues.extend(page.issues);

            match page.next_page_token {
                Some(token) if !page.is_last && issues.len() < max => next_page_token = Some(token),
                _ => break,
            }
        }

        issues.truncate(max);
        info!("Jira search returned {} issues", issues.len());

        Ok(issues)
    }

    #[instrument(name = "RestJiraClient::get_projects", skip_all)]
    async fn get_projects(&self) -> Res<Vec<JiraProject>> {
        match self.request::<Vec<JiraProject>>(Method::GET, &["project"], &[], None).await {
            Ok(projects) => return Ok(projects),
            Err(err) => warn!("Listing projects failed, falling back to project search: {err}"),
        }

        match self.search_projects().await {
            Ok(projects) => Ok(projects),
            Err(err) => {
                warn!("Project search failed: {err}");
                Ok(Vec::new())
            }
        }
    }

    #[instrument(name = "RestJiraClient::get_issue", skip(self))]
    async fn get_issue(&self, issue_key: &str) -> Res<RawIssue> {
        self.request(Method::GET, &["issue", issue_key], &[], None).await
    }

    #[instrument(name = "RestJiraClient::create_issue", skip_all, fields(project = %issue.project_key))]
    async fn create_issue(&self, issue: &NewIssue) -> Res<CreatedIssue> {
        let mut fields = json!({
            "project": { "key": issue.project_key },
            "summary": issue.summary,
            "description": adf::paragraph_doc(&issue.description),
            "issuetype": { "name": issue.issue_type },
        });

        if let Some(parent) = &issue.parent_key {
            fields["parent"] = json!({ "key": parent });
        }

        if let Some(priority) = &issue.priority {
            fields["priority"] = json!({ "name": priority });
        }

        let created: CreatedIssue = self.request(Method::POST, &["issue"], &[], Some(&json!({ "fields": fields }))).await?;
        info!("Created Jira issue {}", created.key);

        Ok(created)
    }

    #[instrument(name = "RestJiraClient::add_comment", skip(self, comment))]
    async fn add_comment(&self, issue_key: &str, comment: &str) -> Void {
        let body = json!({ "body": adf::paragraph_doc(comment) });
        let _: Value = self.request(Method::POST, &["issue", issue_key, "comment"], &[], Some(&body)).await?;

        Ok(())
    }
}

// Tests.
