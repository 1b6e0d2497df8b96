//! Prompt templates for LLM usage.

/// System directive for free-text summarization.
pub const SUMMARY_SYSTEM_DIRECTIVE: &str = "You are a helpful assistant that creates concise, informative summaries.";

/// System directive for action item extraction.
pub const ACTION_ITEMS_SYSTEM_DIRECTIVE: &str = "You are a helpful assistant that extracts action items from meeting summaries. Always return valid JSON.";

/// System directive for Jira issue status summaries.
pub const ISSUE_SUMMARY_SYSTEM_DIRECTIVE: &str = "You are a project management assistant that creates clear, actionable status summaries for Jira issues.";

/// System directive for ticket structuring.
pub const TICKET_STRUCTURE_SYSTEM_DIRECTIVE: &str =
    "You are a project management assistant that structures action items into well-organized Jira tickets. Always return valid JSON.";

/// System directive for project questions.
pub const PROJECT_QUESTION_SYSTEM_DIRECTIVE: &str = "You are Helios, a helpful project management assistant. Always be accurate and reference the data provided.";

/// System directive for follow-up questions.
pub const FOLLOWUP_SYSTEM_DIRECTIVE: &str = "You are Helios, a helpful project management assistant.";

/// Summarize arbitrary text in roughly `max_words` words.
pub fn summary_prompt(text: &str, max_words: usize) -> String {
    format!(
        r#####"Please provide a concise summary of the following text in approximately {max_words} words or less.
Focus on the key points, current status, and any important details.

Text:
{text}

Summary:"#####
    )
}

/// Extract action items from a meeting summary as a JSON object.
pub fn action_items_prompt(meeting_summary: &str) -> String {
    format!(
        r#####"Analyze the following meeting summary and extract all action items.
For each action item, identify:
1. The task/action description
2. The assignee (person responsible, if mentioned)
3. Priority (high/medium/low, if mentioned)
4. Due date or timeline (if mentioned)
5. Related context or dependencies

Return the results as a JSON object with an "action_items" array:
{{
  "action_items": [
    {{
      "task": "description of the action item",
      "assignee": "name or null if not mentioned",
      "priority": "high/medium/low or null",
      "due_date": "date or timeline or null",
      "context": "additional context or dependencies"
    }}
  ]
}}

Meeting Summary:
{meeting_summary}

Action Items (JSON only, no additional text):"#####
    )
}

/// Status summary of one Jira issue.
pub fn issue_summary_prompt(issue_context: &str) -> String {
    format!(
        r#####"Based on the following Jira issue information, generate a comprehensive status summary.
The summary should include:
1. Current status and progress
2. Key accomplishments or blockers
3. Next steps or recommendations
4. Any risks or dependencies

Issue Information:
{issue_context}

Status Summary:"#####
    )
}

/// Suggest how action items should become Jira tickets.
pub fn ticket_structure_prompt(action_items_json: &str) -> String {
    format!(
        r#####"Analyze the following action items and suggest how they should be structured as Jira tickets.
Determine:
1. Which items should be parent tickets vs subtasks
2. Grouping of related items
3. Suggested issue types (Task, Story, Bug, Epic, etc.)
4. Suggested priorities
5. Dependencies between items

Action Items:
{action_items_json}

Return a JSON object with this structure:
{{
  "parent_tickets": [
    {{
      "summary": "ticket title",
      "issue_type": "Epic/Story/Task",
      "description": "detailed description",
      "priority": "high/medium/low",
      "subtasks": [
        {{
          "summary": "subtask title",
          "description": "subtask description",
          "assignee": "name or null"
        }}
      ]
    }}
  ],
  "standalone_tickets": [
    {{
      "summary": "ticket title",
      "issue_type": "Task/Bug",
      "description": "description",
      "priority": "high/medium/low",
      "assignee": "name or null"
    }}
  ]
}}

Suggested Structure (JSON only):"#####
    )
}

/// Facts handed to the model for an analytical project question.
pub struct ProjectQuestion<'a> {
    pub project_key: &'a str,
    pub total_issues: usize,
    pub epics: usize,
    pub stories: usize,
    pub tasks: usize,
    pub status_summary: &'a str,
    pub roadmap: &'a str,
    pub meeting_context: &'a str,
    pub query: &'a str,
}

/// Answer a free-form question about a project, pinned to the fetched numbers.
pub fn project_question_prompt(q: &ProjectQuestion<'_>) -> String {
    let ProjectQuestion {
        project_key,
        total_issues,
        epics,
        stories,
        tasks,
        status_summary,
        roadmap,
        meeting_context,
        query,
    } = q;

    format!(
        r#####"You are Helios, a project management assistant. Answer the user's question about project {project_key}.

CRITICAL: The project {project_key} has {total_issues} total issues. This is a FACT.

PROJECT DATA:
Project Key: {project_key}
Total Issues: {total_issues}
Epics: {epics}
Stories: {stories}
Tasks: {tasks}

STATUS SUMMARY:
{status_summary}

ROADMAP:
{roadmap}
{meeting_context}

USER QUESTION: {query}

INSTRUCTIONS:
- The project {project_key} DEFINITELY has {total_issues} issues
- NEVER say there are no issues or that the project doesn't exist
- Reference the specific numbers from the data above
- Be accurate and helpful"#####
    )
}

/// Answer a follow-up using the previous report.
pub fn followup_prompt(project_key: &str, status_summary: &str, roadmap: &str, previous_response: &str, query: &str) -> String {
    format!(
        r#####"You are Helios, a project management assistant. Answer the follow-up question based on the previous context.

Previous Project: {project_key}
Previous Status Summary: {status_summary}
Previous Roadmap: {roadmap}
Previous Response: {previous_response}

Current Question: {query}

Provide a clear, helpful answer."#####
    )
}
