//! Project snapshots: fetch, categorize, aggregate, and render as markdown.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument, warn};

use crate::{
    base::types::{IssueCategory, IssueRecord, ProjectData, ProjectMetrics, Res, TypeCounts},
    service::jira::{JiraClient, adf, types::RawIssue},
};

/// Statuses that never count as overdue.
const CLOSED_STATUSES: &[&str] = &["Done", "Closed", "Resolved"];

/// Statuses that flag an epic as not started.
const NOT_STARTED_STATUSES: &[&str] = &["To Do", "Backlog"];

/// Epics listed on the roadmap.
const ROADMAP_EPICS: usize = 10;

/// A project snapshot plus what the categorizer dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedProject {
    pub data: ProjectData,
    /// Number of issues Jira returned, categorized or not.
    pub raw_issue_count: usize,
    /// Issue type name -> count for issues that fit no category.
    pub uncategorized_types: BTreeMap<String, usize>,
}

/// Fetch every issue of a project and build its snapshot.
///
/// The key is checked against the project list first, but a mismatch (or a
/// failing project listing) is only logged: the account may be able to search
/// a project it cannot list.
#[instrument(skip(jira, today))]
pub async fn fetch_project_data(jira: &JiraClient, project_key: &str, max_results: u32, today: NaiveDate) -> Res<FetchedProject> {
    match jira.get_projects().await {
        Ok(projects) if !projects.is_empty() && !projects.iter().any(|p| p.key == project_key) => {
            let available = projects.iter().take(10).map(|p| p.key.as_str()).collect::<Vec<_>>().join(", ");
            warn!("Project '{project_key}' not found in the project list. Available projects: {available}");
        }
        Ok(_) => {}
        Err(err) => debug!("Project listing failed, searching anyway: {err}"),
    }

    let raw_issues = jira.search_issues(&format!("project = {project_key}"), max_results).await?;
    info!("Fetched {} issues for {project_key}", raw_issues.len());

    let mut data = ProjectData {
        project_key: project_key.to_string(),
        ..Default::default()
    };
    let mut uncategorized_types = BTreeMap::new();

    for raw in &raw_issues {
        let record = issue_record(jira, raw);

        match IssueCategory::from_issue_type(&record.issue_type) {
            Some(IssueCategory::Epic) => data.epics.push(record),
            Some(IssueCategory::Story) => data.stories.push(record),
            Some(IssueCategory::Task) => data.tasks.push(record),
            None => {
                let name = if record.issue_type.is_empty() { "Unknown".to_string() } else { record.issue_type };
                *uncategorized_types.entry(name).or_insert(0) += 1;
            }
        }
    }

    data.metrics = compute_metrics(&data, today);
    data.total_issues = data.epics.len() + data.stories.len() + data.tasks.len();

    Ok(FetchedProject {
        data,
        raw_issue_count: raw_issues.len(),
        uncategorized_types,
    })
}

/// Flatten a raw Jira issue into a display record.
pub fn issue_record(jira: &JiraClient, raw: &RawIssue) -> IssueRecord {
    let fields = &raw.fields;
    let issue_type = fields.issuetype.as_ref().map(|t| t.name.clone()).unwrap_or_default();

    let epic_name = if IssueCategory::from_issue_type(&issue_type) == Some(IssueCategory::Epic) {
        fields.epic_name.as_ref().map(adf::extract_text).filter(|name| !name.is_empty())
    } else {
        None
    };

    IssueRecord {
        key: raw.key.clone(),
        summary: fields.summary.clone().unwrap_or_default(),
        issue_type,
        status: fields.status.as_ref().map(|s| s.name.clone()).unwrap_or_else(|| "Unknown".to_string()),
        assignee: fields.assignee.as_ref().and_then(|a| a.display_name.clone()).unwrap_or_else(|| "Unassigned".to_string()),
        created: fields.created.clone().unwrap_or_default(),
        updated: fields.updated.clone().unwrap_or_default(),
        priority: fields.priority.as_ref().map(|p| p.name.clone()).unwrap_or_else(|| "Medium".to_string()),
        due_date: fields.duedate.clone().filter(|d| !d.is_empty()),
        description: fields.description.as_ref().map(adf::extract_text).unwrap_or_default(),
        url: jira.browse_url(&raw.key),
        epic_name,
    }
}

/// Parse a Jira date or timestamp down to its calendar date.
pub fn parse_due_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
        .or_else(|| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z").ok().map(|dt| dt.date_naive()))
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok().map(|dt| dt.date()))
}

fn is_overdue(issue: &IssueRecord, today: NaiveDate) -> bool {
    let Some(due) = issue.due_date.as_deref().and_then(parse_due_date) else {
        return false;
    };

    due < today && !CLOSED_STATUSES.contains(&issue.status.as_str())
}

/// Aggregate counts over every categorized issue.
pub fn compute_metrics(data: &ProjectData, today: NaiveDate) -> ProjectMetrics {
    let mut metrics = ProjectMetrics {
        type_counts: TypeCounts {
            epics: data.epics.len(),
            stories: data.stories.len(),
            tasks: data.tasks.len(),
        },
        ..Default::default()
    };

    for issue in data.all_issues() {
        *metrics.status_counts.entry(issue.status.clone()).or_insert(0) += 1;
        *metrics.assignee_counts.entry(issue.assignee.clone()).or_insert(0) += 1;
        *metrics
            .status_assignee_matrix
            .entry(issue.assignee.clone())
            .or_default()
            .entry(issue.status.clone())
            .or_insert(0) += 1;

        if is_overdue(issue, today) {
            metrics.overdue_count += 1;
        }

        metrics.total_issues += 1;
    }

    metrics
}

/// Markdown status summary: totals per category, status breakdown, overdue count.
pub fn status_summary(data: &ProjectData) -> String {
    let total = if data.metrics.total_issues > 0 {
        data.metrics.total_issues
    } else {
        data.epics.len() + data.stories.len() + data.tasks.len()
    };

    let mut lines = vec![
        format!("**Project: {}**\n", data.project_key),
        format!("Total Issues: {total}"),
        format!("  - Epics: {}", data.epics.len()),
        format!("  - Stories: {}", data.stories.len()),
        format!("  - Tasks: {}", data.tasks.len()),
        "\n**Status Breakdown:**".to_string(),
    ];

    lines.extend(data.metrics.status_counts.iter().map(|(status, count)| format!("  - {status}: {count}")));

    if data.metrics.overdue_count > 0 {
        lines.push(format!("\n⚠️ **Overdue Issues: {}**", data.metrics.overdue_count));
    }

    lines.join("\n")
}

/// Risk labels for one epic.
fn epic_risks(epic: &IssueRecord, today: NaiveDate) -> Vec<&'static str> {
    let mut risks = Vec::new();

    if epic.assignee == "Unassigned" {
        risks.push("⚠️ Unassigned");
    }

    if NOT_STARTED_STATUSES.contains(&epic.status.as_str()) {
        risks.push("⚠️ Not started");
    }

    if let Some(due) = epic.due_date.as_deref().and_then(parse_due_date) {
        let days_left = (due - today).num_days();

        if days_left < 0 && epic.status != "Done" && epic.status != "Closed" {
            risks.push("🔴 Overdue");
        } else if (0..7).contains(&days_left) {
            risks.push("🟡 Due soon");
        }
    }

    risks
}

/// Markdown roadmap of the first epics, each with its risk labels.
pub fn roadmap(data: &ProjectData, today: NaiveDate) -> String {
    if data.epics.is_empty() {
        return "No epics found for this project.".to_string();
    }

    let mut lines = vec!["**Roadmap:**\n".to_string()];

    for epic in data.epics.iter().take(ROADMAP_EPICS) {
        let name = epic.epic_name.as_deref().unwrap_or(&epic.summary);

        lines.push(format!("**{}**: {name}", epic.key));
        lines.push(format!("  - Status: {}", epic.status));
        lines.push(format!("  - Assignee: {}", epic.assignee));

        let risks = epic_risks(epic, today);
        if !risks.is_empty() {
            lines.push(format!("  - Risks: {}", risks.join(", ")));
        }

        lines.push(String::new());
    }

    lines.join("\n")
}
