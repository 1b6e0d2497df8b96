use chrono::{Local, NaiveDate};
use tracing::{info, instrument, warn};

use crate::{
    base::{
        prompts::{self, ProjectQuestion},
        types::{ProjectReport, QueryOutcome},
    },
    runtime::Runtime,
};

use super::{
    charts::build_charts,
    meeting_notes::{find_meeting_notes, meeting_context},
    project::{fetch_project_data, roadmap, status_summary},
    project_key::extract_project_key,
};

/// Phrases that mark a query as a plain status request.
const STATUS_PHRASES: &[&str] = &["status", "what is", "show me", "tell me about", "overview", "summary", "how many", "count", "progress"];

/// Phrases that show a model claiming a project has no data.
const NO_DATA_PHRASES: &[&str] = &[
    "no issues",
    "no data",
    "no information",
    "not found",
    "does not exist",
    "cannot find",
    "unable to find",
    "there are no",
    "no issues associated",
    "within the what project",
];

const MORE_DETAILS_CLOSING: &str = "Would you like more details about any specific aspect of this project?";
const NO_LLM_CLOSING: &str = "Is there anything specific you'd like to know more about?";
const LLM_FAILED_CLOSING: &str = "(Note: AI processing encountered an issue, but here's the data we found)";

/// Whether the query asks for a plain status overview.
pub fn is_status_query(query: &str) -> bool {
    let query = query.to_lowercase();
    STATUS_PHRASES.iter().any(|phrase| query.contains(phrase))
}

/// Whether a model answer claims there is nothing to report.
pub fn claims_no_data(answer: &str) -> bool {
    let answer = answer.to_lowercase();
    NO_DATA_PHRASES.iter().any(|phrase| answer.contains(phrase))
}

fn data_driven_answer(project_key: &str, status_summary: &str, roadmap: &str, meeting_context: &str, closing: &str) -> String {
    format!("**Project {project_key} Status:**\n\n{status_summary}\n\n{roadmap}\n\n{meeting_context}\n\n{closing}")
}

/// Answer a question about a project.
///
/// The project key comes from `project_key` when given, otherwise it is
/// extracted from the query. Failures to identify the project or to reach Jira
/// are reported as `Unresolved`; Drive and LLM failures only degrade the
/// answer.
#[instrument(skip(runtime))]
pub async fn process_query(runtime: &Runtime, query: &str, project_key: Option<&str>) -> QueryOutcome {
    process_query_on(runtime, query, project_key, Local::now().date_naive()).await
}

/// [`process_query`] with a fixed notion of today.
pub async fn process_query_on(runtime: &Runtime, query: &str, project_key: Option<&str>, today: NaiveDate) -> QueryOutcome {
    let project_key = project_key.map(str::trim).filter(|key| !key.is_empty()).map(str::to_uppercase).or_else(|| extract_project_key(query));

    let Some(project_key) = project_key else {
        return QueryOutcome::Unresolved {
            error: "Could not identify project. Please mention the project name (e.g., 'What is the status of Project ABC?')".to_string(),
            response: "I couldn't identify which project you're asking about. Please mention the project name in your question.".to_string(),
        };
    };

    // Fetch Jira data.

    let fetched = match fetch_project_data(&runtime.jira, &project_key, runtime.config.jira_max_results, today).await {
        Ok(fetched) => fetched,
        Err(err) => {
            warn!("Jira fetch for {project_key} failed: {err}");
            return QueryOutcome::Unresolved {
                error: format!("Failed to fetch Jira data: {err}"),
                response: format!("I encountered an error while fetching data from Jira: {err}"),
            };
        }
    };

    if fetched.data.total_issues == 0 && fetched.raw_issue_count > 0 {
        let tally = fetched.uncategorized_types.iter().map(|(name, count)| format!("{name}: {count}")).collect::<Vec<_>>().join(", ");
        let names = fetched.uncategorized_types.keys().cloned().collect::<Vec<_>>().join(", ");

        return QueryOutcome::Unresolved {
            error: format!("Found {} issues from API but categorization returned 0. Issue types found: {tally}", fetched.raw_issue_count),
            response: format!(
                "I found {} issues from Jira API, but they weren't categorized correctly. Issue types: {names}. This may indicate a problem with issue type matching.",
                fetched.raw_issue_count
            ),
        };
    }

    let data = fetched.data;

    // Gather meeting notes.

    let meeting_notes = match &runtime.docs {
        Some(docs) => find_meeting_notes(docs, &project_key).await,
        None => Vec::new(),
    };

    let status_summary = status_summary(&data);
    let roadmap = roadmap(&data, today);
    let meeting_context = meeting_context(runtime.llm.as_ref(), &meeting_notes).await;

    // Compose the answer.

    let answer = if is_status_query(query) || data.total_issues == 0 {
        data_driven_answer(&project_key, &status_summary, &roadmap, &meeting_context, MORE_DETAILS_CLOSING)
    } else if let Some(llm) = &runtime.llm {
        let prompt = prompts::project_question_prompt(&ProjectQuestion {
            project_key: &project_key,
            total_issues: data.total_issues,
            epics: data.epics.len(),
            stories: data.stories.len(),
            tasks: data.tasks.len(),
            status_summary: &status_summary,
            roadmap: &roadmap,
            meeting_context: &meeting_context,
            query,
        });

        match llm.answer(prompts::PROJECT_QUESTION_SYSTEM_DIRECTIVE, prompt).await {
            Ok(answer) if claims_no_data(&answer) => {
                warn!("Model claimed {project_key} has no data; using the data-driven answer");
                data_driven_answer(&project_key, &status_summary, &roadmap, &meeting_context, MORE_DETAILS_CLOSING)
            }
            Ok(answer) => answer,
            Err(err) => {
                warn!("LLM answer for {project_key} failed: {err}");
                data_driven_answer(&project_key, &status_summary, &roadmap, &meeting_context, LLM_FAILED_CLOSING)
            }
        }
    } else {
        data_driven_answer(&project_key, &status_summary, &roadmap, &meeting_context, NO_LLM_CLOSING)
    };

    info!("Answered query about {project_key} ({} issues, {} meeting notes)", data.total_issues, meeting_notes.len());

    QueryOutcome::Answered(Box::new(ProjectReport {
        project_key,
        response: answer,
        status_summary,
        roadmap,
        charts_data: build_charts(&data),
        meeting_notes,
        jira_data: data,
    }))
}

/// Answer a follow-up question from the previous report.
///
/// Without an LLM a generic prompt for a more specific question is returned;
/// LLM failures are turned into a message rather than an error.
#[instrument(skip(runtime, previous))]
pub async fn answer_followup(runtime: &Runtime, query: &str, previous: &ProjectReport) -> String {
    let Some(llm) = &runtime.llm else {
        let project = if previous.project_key.is_empty() { "the project" } else { previous.project_key.as_str() };
        return format!("Based on the previous context about {project}, I can help you understand the status, roadmap, and progress. What specific aspect would you like to know more about?");
    };

    let prompt = prompts::followup_prompt(&previous.project_key, &previous.status_summary, &previous.roadmap, &previous.response, query);

    match llm.answer(prompts::FOLLOWUP_SYSTEM_DIRECTIVE, prompt).await {
        Ok(answer) => answer,
        Err(err) => format!("I encountered an error while processing your question: {err}"),
    }
}
