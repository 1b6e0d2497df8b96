//! Jira REST v3 wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An issue as returned by `search/jql` or `issue/{key}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawIssue {
    pub key: String,
    #[serde(default)]
    pub fields: RawIssueFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawIssueFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub issuetype: Option<Named>,
    #[serde(default)]
    pub status: Option<Named>,
    #[serde(default)]
    pub assignee: Option<JiraUser>,
    #[serde(default)]
    pub reporter: Option<JiraUser>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub priority: Option<Named>,
    #[serde(default)]
    pub duedate: Option<String>,
    /// Atlassian Document Format (or plain text on older instances).
    #[serde(default)]
    pub description: Option<Value>,
    /// Epic Name.
    #[serde(default, rename = "customfield_10011")]
    pub epic_name: Option<Value>,
    #[serde(default)]
    pub comment: Option<CommentPage>,
}

/// Anything Jira represents as `{ "name": ... }` (status, type, priority).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraUser {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentPage {
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub author: Option<JiraUser>,
    #[serde(default)]
    pub body: Option<Value>,
}

/// One page of `GET /search/jql`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub issues: Vec<RawIssue>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default = "default_is_last")]
    pub is_last: bool,
}

/// One page of `GET /project/search`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPage {
    #[serde(default)]
    pub values: Vec<JiraProject>,
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default = "default_is_last")]
    pub is_last: bool,
}

fn default_is_last() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraProject {
    pub key: String,
    #[serde(default)]
    pub name: String,
}

/// Fields for a new issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewIssue {
    pub project_key: String,
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    /// Parent issue key, for subtasks.
    pub parent_key: Option<String>,
    pub priority: Option<String>,
}

/// Response of `POST /issue`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    #[serde(default)]
    pub id: String,
    pub key: String,
}
