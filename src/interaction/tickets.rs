//! Issue summaries and meeting-driven ticket planning.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    base::types::{ActionItem, Res, TicketStructure},
    runtime::Runtime,
    service::{
        jira::{
            JiraClient,
            types::{CreatedIssue, NewIssue},
        },
        llm::LlmClient,
    },
};

/// Subtask issue type names, in the order they are tried. Team-managed
/// projects use the first, company-managed projects the second.
const SUBTASK_ISSUE_TYPES: [&str; 2] = ["Subtask", "Sub-task"];

/// An AI status summary of one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueSummary {
    pub key: String,
    pub url: String,
    pub summary: String,
    /// Whether the summary was posted back as a comment.
    pub comment_posted: bool,
}

/// A ticket created from a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedTicket {
    pub key: String,
    pub summary: String,
    pub issue_type: String,
    pub parent_key: Option<String>,
}

/// Action items and suggested tickets for one meeting document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TicketPlan {
    pub document_id: String,
    pub action_items: Vec<ActionItem>,
    pub structure: TicketStructure,
    /// Tickets created in Jira, when creation was requested.
    pub created: Vec<CreatedTicket>,
    /// Tickets Jira rejected; the rest were still attempted.
    pub failed: Vec<FailedTicket>,
}

/// A suggested ticket that could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTicket {
    pub summary: String,
    pub issue_type: String,
    pub parent_key: Option<String>,
    pub error: String,
}

/// Outcome of creating every ticket in a structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TicketCreation {
    pub created: Vec<CreatedTicket>,
    pub failed: Vec<FailedTicket>,
}

impl TicketCreation {
    fn record(&mut self, request: &NewIssue, result: Res<CreatedIssue>) -> Option<String> {
        match result {
            Ok(issue) => {
                let key = issue.key.clone();
                self.created.push(created_ticket(issue, request));
                Some(key)
            }
            Err(err) => {
                warn!("Failed to create `{}`: {err}", request.summary);
                self.failed.push(failed_ticket(request, err.to_string()));
                None
            }
        }
    }
}

fn require_llm(runtime: &Runtime) -> Res<&LlmClient> {
    runtime
        .llm
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("LLM not configured. Set GEMINI_API_KEY or OPENAI_API_KEY."))
}

/// Summarize an issue with its recent comments, optionally posting the summary back.
#[instrument(skip(runtime))]
pub async fn summarize_issue(runtime: &Runtime, issue_key: &str, post_comment: bool) -> Res<IssueSummary> {
    let llm = require_llm(runtime)?;

    let issue = runtime.jira.get_issue(issue_key).await?;
    let summary = llm.generate_issue_summary(&issue).await?;

    if post_comment {
        runtime.jira.add_comment(&issue.key, &format!("AI status summary:\n\n{summary}")).await?;
        info!("Posted summary to {}", issue.key);
    }

    Ok(IssueSummary {
        url: runtime.jira.browse_url(&issue.key),
        key: issue.key,
        summary,
        comment_posted: post_comment,
    })
}

/// Turn a meeting document into action items and a suggested ticket structure.
///
/// When `create_in` names a project, every suggested ticket is created there:
/// parents first, then their subtasks, then the standalone tickets.
#[instrument(skip(runtime))]
pub async fn plan_tickets(runtime: &Runtime, document_id: &str, create_in: Option<&str>) -> Res<TicketPlan> {
    let llm = require_llm(runtime)?;
    let docs = runtime.docs.as_ref().ok_or_else(|| anyhow::anyhow!("Google Drive is not configured."))?;

    let content = docs.read_document(document_id).await?;
    let action_items = llm.extract_action_items(&content).await?;

    let structure = if action_items.is_empty() {
        TicketStructure::default()
    } else {
        llm.suggest_ticket_structure(&action_items).await?
    };

    let creation = match create_in {
        Some(project_key) => create_tickets(&runtime.jira, project_key, &structure).await,
        None => TicketCreation::default(),
    };

    Ok(TicketPlan {
        document_id: document_id.to_string(),
        action_items,
        structure,
        created: creation.created,
        failed: creation.failed,
    })
}

fn with_assignee_hint(description: &str, assignee: Option<&str>) -> String {
    match assignee.map(str::trim).filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("null")) {
        Some(assignee) => format!("{description}\n\nSuggested assignee: {assignee}"),
        None => description.to_string(),
    }
}

/// Jira priority name for a suggested priority (`high` -> `High`).
fn priority_name(priority: Option<&str>) -> Option<String> {
    let priority = priority.map(str::trim).filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("null"))?;
    let mut chars = priority.chars();
    let first = chars.next()?;

    Some(first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect())
}

fn created_ticket(issue: CreatedIssue, request: &NewIssue) -> CreatedTicket {
    CreatedTicket {
        key: issue.key,
        summary: request.summary.clone(),
        issue_type: request.issue_type.clone(),
        parent_key: request.parent_key.clone(),
    }
}

fn failed_ticket(request: &NewIssue, error: String) -> FailedTicket {
    FailedTicket {
        summary: request.summary.clone(),
        issue_type: request.issue_type.clone(),
        parent_key: request.parent_key.clone(),
        error,
    }
}

/// Create a subtask, falling back through the subtask type names.
async fn create_subtask(jira: &JiraClient, mut request: NewIssue) -> (NewIssue, Res<CreatedIssue>) {
    let mut last_err = None;

    for issue_type in SUBTASK_ISSUE_TYPES {
        request.issue_type = issue_type.to_string();

        match jira.create_issue(&request).await {
            Ok(issue) => return (request, Ok(issue)),
            Err(err) => {
                debug!("Subtask type `{issue_type}` rejected: {err}");
                last_err = Some(err);
            }
        }
    }

    let err = last_err.unwrap_or_else(|| anyhow::anyhow!("no subtask issue type"));
    (request, Err(err))
}

/// Create every ticket in a structure.
///
/// Parents go first, each followed by its subtasks, then the standalone
/// tickets. A rejected ticket is recorded and the rest are still attempted;
/// subtasks of a rejected parent are recorded as failed without a request.
#[instrument(skip(jira, structure))]
pub async fn create_tickets(jira: &JiraClient, project_key: &str, structure: &TicketStructure) -> TicketCreation {
    let mut creation = TicketCreation::default();

    for parent in &structure.parent_tickets {
        let request = NewIssue {
            project_key: project_key.to_string(),
            summary: parent.summary.clone(),
            description: parent.description.clone(),
            issue_type: parent.issue_type.clone(),
            parent_key: None,
            priority: priority_name(parent.priority.as_deref()),
        };

        let result = jira.create_issue(&request).await;
        let parent_key = creation.record(&request, result);

        for subtask in &parent.subtasks {
            let request = NewIssue {
                project_key: project_key.to_string(),
                summary: subtask.summary.clone(),
                description: with_assignee_hint(&subtask.description, subtask.assignee.as_deref()),
                issue_type: SUBTASK_ISSUE_TYPES[0].to_string(),
                parent_key: parent_key.clone(),
                priority: None,
            };

            if parent_key.is_none() {
                creation.failed.push(failed_ticket(&request, format!("parent ticket `{}` was not created", parent.summary)));
                continue;
            }

            let (request, result) = create_subtask(jira, request).await;
            creation.record(&request, result);
        }
    }

    for ticket in &structure.standalone_tickets {
        let request = NewIssue {
            project_key: project_key.to_string(),
            summary: ticket.summary.clone(),
            description: with_assignee_hint(&ticket.description, ticket.assignee.as_deref()),
            issue_type: ticket.issue_type.clone(),
            parent_key: None,
            priority: priority_name(ticket.priority.as_deref()),
        };

        let result = jira.create_issue(&request).await;
        creation.record(&request, result);
    }

    info!("Created {} tickets in {project_key} ({} failed)", creation.created.len(), creation.failed.len());

    creation
}
