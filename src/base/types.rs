//! Common result aliases and the domain types shared across services.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

// Jira.

/// Coarse bucket a Jira issue type falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueCategory {
    Epic,
    Story,
    Task,
}

impl IssueCategory {
    /// Categorize a raw Jira issue type name (e.g., `Sub-task`, `User Story`).
    ///
    /// Returns `None` for types that fit none of the buckets (e.g., `Bug`).
    pub fn from_issue_type(issue_type: &str) -> Option<Self> {
        let issue_type = issue_type.to_lowercase();

        if issue_type.contains("epic") {
            Some(Self::Epic)
        } else if issue_type.contains("story") {
            Some(Self::Story)
        } else if issue_type.contains("task") || issue_type.contains("subtask") {
            Some(Self::Task)
        } else {
            None
        }
    }
}

/// A flattened Jira issue, as displayed and aggregated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub key: String,
    pub summary: String,
    pub issue_type: String,
    pub status: String,
    pub assignee: String,
    pub created: String,
    pub updated: String,
    pub priority: String,
    pub due_date: Option<String>,
    pub description: String,
    pub url: String,
    pub epic_name: Option<String>,
}

/// Issue counts per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    pub epics: usize,
    pub stories: usize,
    pub tasks: usize,
}

/// Aggregates computed over every categorized issue of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetrics {
    pub status_counts: BTreeMap<String, usize>,
    pub assignee_counts: BTreeMap<String, usize>,
    pub type_counts: TypeCounts,
    /// Assignee -> status -> count.
    pub status_assignee_matrix: BTreeMap<String, BTreeMap<String, usize>>,
    pub overdue_count: usize,
    pub total_issues: usize,
}

/// Everything fetched from Jira for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    pub project_key: String,
    pub epics: Vec<IssueRecord>,
    pub stories: Vec<IssueRecord>,
    pub tasks: Vec<IssueRecord>,
    pub metrics: ProjectMetrics,
    pub total_issues: usize,
}

impl ProjectData {
    /// Iterate over epics, then stories, then tasks.
    pub fn all_issues(&self) -> impl Iterator<Item = &IssueRecord> {
        self.epics.iter().chain(self.stories.iter()).chain(self.tasks.iter())
    }
}

// Drive / Docs.

/// A Drive file returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
}

/// A document whose text mentions the project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingNote {
    pub id: String,
    pub name: String,
    pub content: String,
    pub modified_time: Option<String>,
}

// Charts.

/// Zero-filled assignee x status grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heatmap {
    pub assignees: Vec<String>,
    pub statuses: Vec<String>,
    /// One row per assignee, one column per status.
    pub counts: Vec<Vec<usize>>,
}

/// Chart-ready series for the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartsData {
    pub by_type: Vec<(String, usize)>,
    pub by_status: Vec<(String, usize)>,
    pub by_assignee: Vec<(String, usize)>,
    pub by_assignee_and_status: Heatmap,
}

// Conversation.

/// A fully answered project question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project_key: String,
    pub response: String,
    pub status_summary: String,
    pub roadmap: String,
    pub meeting_notes: Vec<MeetingNote>,
    pub charts_data: ChartsData,
    pub jira_data: ProjectData,
}

/// Result of processing one user query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueryOutcome {
    Answered(Box<ProjectReport>),
    Unresolved { error: String, response: String },
}

impl QueryOutcome {
    /// The text shown to the user in the chat.
    pub fn response(&self) -> &str {
        match self {
            QueryOutcome::Answered(report) => &report.response,
            QueryOutcome::Unresolved { response, .. } => response,
        }
    }
}

/// One exchange in the chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: String,
    pub response: String,
}

// Meeting follow-ups.

/// An action item pulled out of a meeting summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedSubtask {
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedParentTicket {
    pub summary: String,
    #[serde(default = "default_parent_issue_type")]
    pub issue_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<SuggestedSubtask>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedTicket {
    pub summary: String,
    #[serde(default = "default_standalone_issue_type")]
    pub issue_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
}

/// How action items should map onto Jira tickets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStructure {
    #[serde(default)]
    pub parent_tickets: Vec<SuggestedParentTicket>,
    #[serde(default)]
    pub standalone_tickets: Vec<SuggestedTicket>,
}

fn default_parent_issue_type() -> String {
    "Story".to_string()
}

fn default_standalone_issue_type() -> String {
    "Task".to_string()
}
