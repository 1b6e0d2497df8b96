#![cfg(test)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use helios::{
    base::{
        config::{Config, ConfigInner, LlmProvider},
        types::{DocumentRef, QueryOutcome, Res, TicketStructure, Void},
    },
    interaction::{answer_followup, process_query, tickets},
    runtime::{LLM_MISSING_WARNING, Runtime},
    service::{
        docs::{DocsClient, GenericDocsClient},
        jira::{
            GenericJiraClient, JiraClient,
            types::{CreatedIssue, JiraProject, NewIssue, RawIssue},
        },
        llm::{GenericLlmClient, LlmClient, LlmRequest},
    },
    web::{AppState, RuntimeProvider, router},
};
use mockall::{mock, predicate::eq};
use serde_json::{Value, json};
use tower::ServiceExt;

// Mocks.

mock! {
    pub Jira {}

    #[async_trait]
    impl GenericJiraClient for Jira {
        fn base_url(&self) -> &str;
        async fn search_issues(&self, jql: &str, max_results: u32) -> Res<Vec<RawIssue>>;
        async fn get_projects(&self) -> Res<Vec<JiraProject>>;
        async fn get_issue(&self, issue_key: &str) -> Res<RawIssue>;
        async fn create_issue(&self, issue: &NewIssue) -> Res<CreatedIssue>;
        async fn add_comment(&self, issue_key: &str, comment: &str) -> Void;
    }
}

mock! {
    pub Docs {}

    #[async_trait]
    impl GenericDocsClient for Docs {
        async fn search_documents(&self, query: &str, mime_type: &str) -> Res<Vec<DocumentRef>>;
        async fn read_document(&self, document_id: &str) -> Res<String>;
    }
}

mock! {
    pub Llm {}

    #[async_trait]
    impl GenericLlmClient for Llm {
        fn provider(&self) -> LlmProvider;
        fn model(&self) -> &str;
        async fn generate(&self, request: &LlmRequest) -> Res<String>;
    }
}

// Helpers.

fn test_config() -> Config {
    ConfigInner {
        jira_base_url: "https://acme.atlassian.net".to_string(),
        jira_email: "pm@acme.test".to_string(),
        jira_api_token: "secret".to_string(),
        ..Default::default()
    }
    .into()
}

fn raw_issue(key: &str, issue_type: &str, status: &str, assignee: Option<&str>) -> RawIssue {
    serde_json::from_value(json!({
        "key": key,
        "fields": {
            "summary": format!("{key} summary"),
            "issuetype": { "name": issue_type },
            "status": { "name": status },
            "assignee": assignee.map(|name| json!({ "displayName": name })),
            "priority": { "name": "High" }
        }
    }))
    .unwrap()
}

fn abc_issues() -> Vec<RawIssue> {
    vec![
        raw_issue("ABC-1", "Epic", "In Progress", Some("Ana")),
        raw_issue("ABC-2", "Story", "Done", Some("Ana")),
        raw_issue("ABC-3", "Sub-task", "To Do", None),
        raw_issue("ABC-4", "Bug", "To Do", Some("Bo")),
    ]
}

fn mock_jira(issues: Vec<RawIssue>) -> JiraClient {
    let mut mock = MockJira::new();

    mock.expect_base_url().return_const("https://acme.atlassian.net".to_string());
    mock.expect_get_projects().returning(|| {
        Ok(vec![JiraProject {
            key: "ABC".to_string(),
            name: "Acme Billing".to_string(),
        }])
    });
    mock.expect_search_issues()
        .with(eq("project = ABC"), eq(500u32))
        .returning(move |_, _| Ok(issues.clone()));

    JiraClient::new(Arc::new(mock))
}

fn mock_llm(answer: impl Fn(&LlmRequest) -> Res<String> + Send + 'static) -> LlmClient {
    let mut mock = MockLlm::new();

    mock.expect_provider().return_const(LlmProvider::Gemini);
    mock.expect_model().return_const("gemini-2.0-flash".to_string());
    mock.expect_generate().returning(answer);

    LlmClient::new(Arc::new(mock))
}

fn answered(outcome: QueryOutcome) -> helios::base::types::ProjectReport {
    match outcome {
        QueryOutcome::Answered(report) => *report,
        QueryOutcome::Unresolved { error, .. } => panic!("expected an answer, got: {error}"),
    }
}

// Chat engine.

#[tokio::test]
async fn test_status_query_without_llm_is_data_driven() {
    let runtime = Runtime::from_parts(test_config(), mock_jira(abc_issues()), None, None);

    let report = answered(process_query(&runtime, "What is the status of Project ABC?", None).await);

    assert_eq!(report.project_key, "ABC");
    assert_eq!(report.jira_data.total_issues, 3);
    assert_eq!(report.jira_data.tasks[0].assignee, "Unassigned");
    assert_eq!(report.jira_data.epics[0].url, "https://acme.atlassian.net/browse/ABC-1");
    assert!(report.response.starts_with("**Project ABC Status:**\n\n**Project: ABC**"));
    assert!(report.response.contains("Total Issues: 3"));
    assert!(report.response.contains("**ABC-1**: ABC-1 summary"));
    assert!(report.response.ends_with("Would you like more details about any specific aspect of this project?"));
    assert!(report.meeting_notes.is_empty());
}

#[tokio::test]
async fn test_charts_aggregate_counts() {
    let runtime = Runtime::from_parts(test_config(), mock_jira(abc_issues()), None, None);

    let charts = answered(process_query(&runtime, "status of ABC", None).await).charts_data;

    assert_eq!(charts.by_type, vec![("Epics".to_string(), 1), ("Stories".to_string(), 1), ("Tasks".to_string(), 1)]);
    assert_eq!(
        charts.by_status,
        vec![("Done".to_string(), 1), ("In Progress".to_string(), 1), ("To Do".to_string(), 1)]
    );
    assert_eq!(charts.by_assignee, vec![("Ana".to_string(), 2), ("Unassigned".to_string(), 1)]);
    assert_eq!(charts.by_assignee_and_status.assignees, vec!["Ana", "Unassigned"]);
    assert_eq!(charts.by_assignee_and_status.counts, vec![vec![1, 1, 0], vec![0, 0, 1]]);
}

#[tokio::test]
async fn test_unidentified_project() {
    let runtime = Runtime::from_parts(test_config(), JiraClient::new(Arc::new(MockJira::new())), None, None);

    match process_query(&runtime, "what is the status?", None).await {
        QueryOutcome::Unresolved { error, response } => {
            assert!(error.starts_with("Could not identify project."));
            assert!(response.starts_with("I couldn't identify which project"));
        }
        QueryOutcome::Answered(_) => panic!("expected an unresolved outcome"),
    }
}

#[tokio::test]
async fn test_jira_failure_is_reported() {
    let mut jira = MockJira::new();
    jira.expect_get_projects().returning(|| Err(anyhow::anyhow!("403")));
    jira.expect_search_issues()
        .returning(|_, _| Err(anyhow::anyhow!("Jira API request failed: GET search/jql returned 401 Unauthorized: bad token")));

    let runtime = Runtime::from_parts(test_config(), JiraClient::new(Arc::new(jira)), None, None);

    match process_query(&runtime, "status of ABC", None).await {
        QueryOutcome::Unresolved { error, response } => {
            assert!(error.starts_with("Failed to fetch Jira data: Jira API request failed"));
            assert!(response.contains("401 Unauthorized"));
        }
        QueryOutcome::Answered(_) => panic!("expected an unresolved outcome"),
    }
}

#[tokio::test]
async fn test_uncategorized_issues_are_reported() {
    let issues = vec![raw_issue("ABC-4", "Bug", "To Do", None), raw_issue("ABC-5", "Bug", "Done", None)];
    let runtime = Runtime::from_parts(test_config(), mock_jira(issues), None, None);

    match process_query(&runtime, "status of ABC", None).await {
        QueryOutcome::Unresolved { error, response } => {
            assert_eq!(error, "Found 2 issues from API but categorization returned 0. Issue types found: Bug: 2");
            assert!(response.contains("Issue types: Bug."));
        }
        QueryOutcome::Answered(_) => panic!("expected an unresolved outcome"),
    }
}

#[tokio::test]
async fn test_analytical_query_uses_llm_answer() {
    let llm = mock_llm(|request| {
        assert!(request.prompt.contains("The project ABC has 3 total issues"));
        assert!(request.prompt.contains("USER QUESTION: Which epics of ABC are at risk?"));
        Ok("  ABC-1 is in progress and owned by Ana.  ".to_string())
    });
    let runtime = Runtime::from_parts(test_config(), mock_jira(abc_issues()), None, Some(llm));

    let report = answered(process_query(&runtime, "Which epics of ABC are at risk?", None).await);

    assert_eq!(report.response, "ABC-1 is in progress and owned by Ana.");
}

#[tokio::test]
async fn test_llm_claiming_no_data_is_overridden() {
    let llm = mock_llm(|_| Ok("Unfortunately there are no issues associated with ABC.".to_string()));
    let runtime = Runtime::from_parts(test_config(), mock_jira(abc_issues()), None, Some(llm));

    let report = answered(process_query(&runtime, "Which epics of ABC are at risk?", None).await);

    assert!(report.response.starts_with("**Project ABC Status:**"));
    assert!(report.response.ends_with("Would you like more details about any specific aspect of this project?"));
}

#[tokio::test]
async fn test_llm_failure_falls_back_with_note() {
    let llm = mock_llm(|_| Err(anyhow::anyhow!("gemini API call timed out after 120s")));
    let runtime = Runtime::from_parts(test_config(), mock_jira(abc_issues()), None, Some(llm));

    let report = answered(process_query(&runtime, "Which epics of ABC are at risk?", None).await);

    assert!(report.response.ends_with("(Note: AI processing encountered an issue, but here's the data we found)"));
}

#[tokio::test]
async fn test_analytical_query_without_llm() {
    let runtime = Runtime::from_parts(test_config(), mock_jira(abc_issues()), None, None);

    let report = answered(process_query(&runtime, "Which epics of ABC are at risk?", None).await);

    assert!(report.response.ends_with("Is there anything specific you'd like to know more about?"));
}

#[tokio::test]
async fn test_meeting_notes_are_filtered_and_summarized() {
    let mut docs = MockDocs::new();
    docs.expect_search_documents().returning(|query, _| {
        Ok(match query {
            "ABC meeting" => vec![
                DocumentRef { id: "doc-1".to_string(), name: "ABC weekly".to_string(), ..Default::default() },
                DocumentRef { id: "doc-2".to_string(), name: "Offsite".to_string(), ..Default::default() },
            ],
            "ABC notes" => return Err(anyhow::anyhow!("rate limited")),
            _ => vec![DocumentRef { id: "doc-1".to_string(), name: "ABC weekly".to_string(), ..Default::default() }],
        })
    });
    docs.expect_read_document().with(eq("doc-1")).times(1).returning(|_| Ok(format!("abc weekly sync. {}", "Details. ".repeat(80))));
    docs.expect_read_document().with(eq("doc-2")).times(1).returning(|_| Ok("Planning the offsite.".to_string()));

    let llm = mock_llm(|request| {
        assert!(request.prompt.contains("abc weekly sync"));
        Ok("Team agreed to ship ABC-1 next sprint.".to_string())
    });

    let runtime = Runtime::from_parts(test_config(), mock_jira(abc_issues()), Some(DocsClient::new(Arc::new(docs))), Some(llm));

    let report = answered(process_query(&runtime, "Show me ABC", None).await);

    assert_eq!(report.meeting_notes.len(), 1);
    assert_eq!(report.meeting_notes[0].id, "doc-1");
    assert!(report.response.contains("**Recent Meeting Notes:**\n- ABC weekly: Team agreed to ship ABC-1 next sprint.\n"));
}

#[tokio::test]
async fn test_followup_without_llm() {
    let runtime = Runtime::from_parts(test_config(), mock_jira(abc_issues()), None, None);
    let report = answered(process_query(&runtime, "status of ABC", None).await);

    let answer = answer_followup(&runtime, "who owns the epic?", &report).await;

    assert!(answer.starts_with("Based on the previous context about ABC"));
}

#[tokio::test]
async fn test_followup_llm_error_becomes_message() {
    let runtime = Runtime::from_parts(test_config(), mock_jira(abc_issues()), None, Some(mock_llm(|_| Err(anyhow::anyhow!("boom")))));
    let report = helios::base::types::ProjectReport {
        project_key: "ABC".to_string(),
        ..Default::default()
    };

    let answer = answer_followup(&runtime, "who owns the epic?", &report).await;

    assert_eq!(answer, "I encountered an error while processing your question: boom");
}

#[test]
fn test_missing_llm_warning() {
    let runtime = Runtime::from_parts(test_config(), JiraClient::new(Arc::new(MockJira::new())), None, None);

    assert_eq!(runtime.warnings, vec![LLM_MISSING_WARNING.to_string()]);
}

// Issue summaries and ticket planning.

#[tokio::test]
async fn test_summarize_issue_posts_comment() {
    let mut jira = MockJira::new();
    jira.expect_base_url().return_const("https://acme.atlassian.net".to_string());
    jira.expect_get_issue().with(eq("ABC-7")).returning(|_| Ok(raw_issue("ABC-7", "Story", "In Review", Some("Ana"))));
    jira.expect_add_comment()
        .withf(|key, comment| key == "ABC-7" && comment.ends_with("On track for Friday."))
        .times(1)
        .returning(|_, _| Ok(()));

    let llm = mock_llm(|request| {
        assert_eq!(request.max_output_tokens, Some(800));
        assert!(request.prompt.contains("Status: In Review"));
        Ok("On track for Friday.".to_string())
    });
    let runtime = Runtime::from_parts(test_config(), JiraClient::new(Arc::new(jira)), None, Some(llm));

    let summary = tickets::summarize_issue(&runtime, "ABC-7", true).await.unwrap();

    assert_eq!(summary.summary, "On track for Friday.");
    assert_eq!(summary.url, "https://acme.atlassian.net/browse/ABC-7");
    assert!(summary.comment_posted);
}

#[tokio::test]
async fn test_plan_tickets_creates_parents_then_subtasks() {
    let mut docs = MockDocs::new();
    docs.expect_read_document().returning(|_| Ok("ABC planning: Ana to draft the launch plan.".to_string()));

    let llm = mock_llm(|request| {
        if request.prompt.contains("Suggested Structure") {
            Ok(json!({
                "parent_tickets": [{
                    "summary": "Launch plan",
                    "description": "Plan the launch",
                    "priority": "High",
                    "subtasks": [{ "summary": "Draft plan", "description": "First draft", "assignee": "Ana" }]
                }],
                "standalone_tickets": [{ "summary": "Book venue" }]
            })
            .to_string())
        } else {
            Ok(r#"```json
{"action_items": [{"task": "Draft the launch plan", "assignee": "Ana"}]}
```"#
                .to_string())
        }
    });

    let mut jira = MockJira::new();
    let mut counter = 0;
    jira.expect_create_issue().times(3).returning(move |issue| {
        counter += 1;
        match counter {
            1 => assert_eq!((issue.issue_type.as_str(), issue.parent_key.as_deref()), ("Story", None)),
            2 => {
                assert_eq!((issue.issue_type.as_str(), issue.parent_key.as_deref()), ("Subtask", Some("ABC-10")));
                assert!(issue.description.ends_with("Suggested assignee: Ana"));
            }
            _ => assert_eq!(issue.issue_type, "Task"),
        }
        Ok(CreatedIssue {
            id: counter.to_string(),
            key: format!("ABC-{}", 9 + counter),
        })
    });

    let runtime = Runtime::from_parts(test_config(), JiraClient::new(Arc::new(jira)), Some(DocsClient::new(Arc::new(docs))), Some(llm));

    let plan = tickets::plan_tickets(&runtime, "doc-1", Some("ABC")).await.unwrap();

    assert_eq!(plan.action_items.len(), 1);
    assert_eq!(plan.structure.parent_tickets[0].subtasks.len(), 1);
    assert_eq!(plan.created.iter().map(|t| t.key.as_str()).collect::<Vec<_>>(), vec!["ABC-10", "ABC-11", "ABC-12"]);
    assert!(plan.failed.is_empty());
}

fn launch_structure() -> TicketStructure {
    serde_json::from_value(json!({
        "parent_tickets": [{
            "summary": "Launch plan",
            "priority": "high",
            "subtasks": [{ "summary": "Draft plan" }]
        }],
        "standalone_tickets": [{ "summary": "Book venue", "priority": "low" }]
    }))
    .unwrap()
}

fn created(key: &str) -> Res<CreatedIssue> {
    Ok(CreatedIssue {
        id: key.to_string(),
        key: key.to_string(),
    })
}

fn keys(creation: &tickets::TicketCreation) -> Vec<&str> {
    creation.created.iter().map(|t| t.key.as_str()).collect()
}

#[tokio::test]
async fn test_create_tickets_keeps_going_after_a_rejected_subtask() {
    let mut jira = MockJira::new();
    jira.expect_create_issue().returning(|issue| match issue.summary.as_str() {
        "Launch plan" => {
            assert_eq!(issue.priority.as_deref(), Some("High"));
            created("ABC-1")
        }
        "Draft plan" => Err(anyhow::anyhow!("400 issuetype: Specify a valid issue type")),
        _ => {
            assert_eq!(issue.priority.as_deref(), Some("Low"));
            created("ABC-2")
        }
    });

    let creation = tickets::create_tickets(&JiraClient::new(Arc::new(jira)), "ABC", &launch_structure()).await;

    assert_eq!(keys(&creation), vec!["ABC-1", "ABC-2"]);
    assert_eq!(creation.failed.len(), 1);
    assert_eq!(creation.failed[0].summary, "Draft plan");
    assert_eq!(creation.failed[0].parent_key.as_deref(), Some("ABC-1"));
    assert!(creation.failed[0].error.contains("Specify a valid issue type"));
}

#[tokio::test]
async fn test_create_tickets_falls_back_to_company_managed_subtask_type() {
    let mut jira = MockJira::new();
    jira.expect_create_issue().returning(|issue| match (issue.summary.as_str(), issue.issue_type.as_str()) {
        ("Launch plan", _) => created("ABC-1"),
        ("Draft plan", "Subtask") => Err(anyhow::anyhow!("400 issuetype: Specify a valid issue type")),
        ("Draft plan", "Sub-task") => created("ABC-2"),
        _ => created("ABC-3"),
    });

    let creation = tickets::create_tickets(&JiraClient::new(Arc::new(jira)), "ABC", &launch_structure()).await;

    assert_eq!(keys(&creation), vec!["ABC-1", "ABC-2", "ABC-3"]);
    assert_eq!(creation.created[1].issue_type, "Sub-task");
    assert!(creation.failed.is_empty());
}

#[tokio::test]
async fn test_create_tickets_skips_subtasks_of_a_rejected_parent() {
    let mut jira = MockJira::new();
    jira.expect_create_issue()
        .withf(|issue| issue.summary != "Draft plan")
        .times(2)
        .returning(|issue| match issue.summary.as_str() {
            "Launch plan" => Err(anyhow::anyhow!("400 priority: Specify a valid priority")),
            _ => created("ABC-1"),
        });

    let creation = tickets::create_tickets(&JiraClient::new(Arc::new(jira)), "ABC", &launch_structure()).await;

    assert_eq!(keys(&creation), vec!["ABC-1"]);
    assert_eq!(creation.failed.iter().map(|t| t.summary.as_str()).collect::<Vec<_>>(), vec!["Launch plan", "Draft plan"]);
    assert!(creation.failed[1].error.contains("parent ticket `Launch plan` was not created"));
}

// Web.

struct FixedRuntime(Runtime);

#[async_trait]
impl RuntimeProvider for FixedRuntime {
    async fn create(&self) -> Res<Runtime> {
        Ok(self.0.clone())
    }
}

struct BrokenConfig;

#[async_trait]
impl RuntimeProvider for BrokenConfig {
    async fn create(&self) -> Res<Runtime> {
        Err(anyhow::anyhow!("Jira configuration incomplete. Please set JIRA_BASE_URL, JIRA_EMAIL, and JIRA_API_TOKEN in your `.env` file."))
    }
}

async fn call(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_web_session_flow() {
    let runtime = Runtime::from_parts(test_config(), mock_jira(abc_issues()), None, None);
    let app = router(AppState::new(Arc::new(FixedRuntime(runtime))));

    let (status, session) = call(&app, "POST", "/api/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["initialized"], false);
    let id = session["id"].as_str().unwrap().to_string();

    // Queries need an initialized session.
    let (status, body) = call(&app, "POST", &format!("/api/session/{id}/query"), Some(json!({ "query": "status of ABC" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("initialize"));

    let (status, init) = call(&app, "POST", &format!("/api/session/{id}/initialize"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(init["initialized"], true);
    assert_eq!(init["warnings"][0], LLM_MISSING_WARNING);

    let (status, result) = call(&app, "POST", &format!("/api/session/{id}/query"), Some(json!({ "query": "status of ABC" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["outcome"]["type"], "Answered");
    assert_eq!(result["session"]["current"]["project_key"], "ABC");
    assert_eq!(result["session"]["current"]["charts_data"]["by_type"][0], json!(["Epics", 1]));
    assert_eq!(result["session"]["history"].as_array().unwrap().len(), 1);

    let (status, result) = call(&app, "POST", &format!("/api/session/{id}/followup"), Some(json!({ "query": "and the risks?" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(result["answer"].as_str().unwrap().starts_with("Based on the previous context about ABC"));
    assert_eq!(result["session"]["history"].as_array().unwrap().len(), 2);

    let (status, cleared) = call(&app, "POST", &format!("/api/session/{id}/reset"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["initialized"], false);
    assert!(cleared["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_web_initialize_reports_config_errors() {
    let app = router(AppState::new(Arc::new(BrokenConfig)));

    let (_, session) = call(&app, "POST", "/api/session", None).await;
    let id = session["id"].as_str().unwrap().to_string();

    let (status, init) = call(&app, "POST", &format!("/api/session/{id}/initialize"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(init["initialized"], false);
    assert!(init["errors"][0].as_str().unwrap().starts_with("Jira configuration incomplete"));
}

#[tokio::test]
async fn test_web_unknown_session_and_static_routes() {
    let app = router(AppState::new(Arc::new(BrokenConfig)));

    let (status, body) = call(&app, "GET", "/api/session/00000000-0000-4000-8000-000000000000", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));

    let response = app.clone().oneshot(Request::builder().uri("/").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&page).contains("<title>Helios</title>"));

    let response = app.clone().oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
