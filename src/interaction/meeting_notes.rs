use futures::{StreamExt, stream};
use tracing::{debug, instrument, warn};

use crate::{
    base::types::{DocumentRef, MeetingNote},
    service::{
        docs::{DocsClient, GOOGLE_DOC_MIME_TYPE},
        llm::LlmClient,
    },
};

/// Documents read per project lookup.
const MAX_DOCUMENTS: usize = 20;

/// Concurrent document reads.
const READ_CONCURRENCY: usize = 4;

/// Notes included in the meeting context.
const CONTEXT_NOTES: usize = 3;

/// Notes shorter than this are quoted rather than summarized.
const EXCERPT_CHARS: usize = 500;

/// Target length of an LLM note summary, in words.
const SUMMARY_WORDS: usize = 150;

/// Find Google Docs that look like meeting notes for a project.
///
/// Every search term is tried in turn and failures are skipped. Hits are
/// deduplicated in first-seen order, at most 20 are read, and only documents
/// whose text mentions the project (case-insensitively) are kept.
#[instrument(skip(docs))]
pub async fn find_meeting_notes(docs: &DocsClient, project: &str) -> Vec<MeetingNote> {
    let terms = [
        format!("{project} meeting"),
        format!("{project} summary"),
        format!("{project} notes"),
        "meeting notes".to_string(),
        "meeting summary".to_string(),
    ];

    let mut found: Vec<DocumentRef> = Vec::new();

    for term in &terms {
        match docs.search_documents(term, GOOGLE_DOC_MIME_TYPE).await {
            Ok(hits) => {
                for hit in hits {
                    if !found.iter().any(|doc| doc.id == hit.id) {
                        found.push(hit);
                    }
                }
            }
            Err(err) => warn!("Search for `{term}` failed: {err}"),
        }
    }

    found.truncate(MAX_DOCUMENTS);

    let needle = project.to_lowercase();

    let notes = stream::iter(found)
        .map(|doc| async move {
            let content = docs.read_document(&doc.id).await;
            (doc, content)
        })
        .buffered(READ_CONCURRENCY)
        .filter_map(|(doc, content)| {
            let note = match content {
                Ok(content) if content.to_lowercase().contains(&needle) => Some(MeetingNote {
                    id: doc.id,
                    name: doc.name,
                    content,
                    modified_time: doc.modified_time,
                }),
                Ok(_) => None,
                Err(err) => {
                    debug!("Skipping document {}: {err}", doc.id);
                    None
                }
            };
            async move { note }
        })
        .collect::<Vec<_>>()
        .await;

    debug!("Found {} meeting notes mentioning {project}", notes.len());

    notes
}

fn excerpt(content: &str) -> String {
    let head = content.chars().take(EXCERPT_CHARS).collect::<String>();
    format!("{head}...")
}

/// Markdown block describing the top meeting notes.
///
/// Long notes are summarized by the LLM when one is configured; short notes,
/// and notes whose summary fails, are quoted instead.
#[instrument(skip_all)]
pub async fn meeting_context(llm: Option<&LlmClient>, notes: &[MeetingNote]) -> String {
    if notes.is_empty() {
        return String::new();
    }

    let mut context = "\n\n**Recent Meeting Notes:**\n".to_string();

    for note in notes.iter().take(CONTEXT_NOTES) {
        let body = match llm {
            Some(llm) if note.content.chars().count() > EXCERPT_CHARS => match llm.generate_summary(&note.content, SUMMARY_WORDS).await {
                Ok(summary) => summary,
                Err(err) => {
                    warn!("Falling back to an excerpt for {}: {err}", note.name);
                    excerpt(&note.content)
                }
            },
            _ => excerpt(&note.content),
        };

        context.push_str(&format!("- {}: {body}\n", note.name));
    }

    context
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{base::types::Res, service::docs::GenericDocsClient};

    /// Drive fake: fixed hits per search term, slower reads for earlier ids.
    #[derive(Default)]
    struct FakeDrive {
        reads: Mutex<Vec<String>>,
    }

    fn hits(prefix: &str, ids: impl IntoIterator<Item = usize>) -> Vec<DocumentRef> {
        ids.into_iter()
            .map(|i| DocumentRef {
                id: format!("doc-{i}"),
                name: format!("{prefix} {i}"),
                ..Default::default()
            })
            .collect()
    }

    #[async_trait]
    impl GenericDocsClient for FakeDrive {
        async fn search_documents(&self, query: &str, _mime_type: &str) -> Res<Vec<DocumentRef>> {
            Ok(match query {
                "ABC meeting" => hits("meeting", 0..12),
                "ABC summary" => [hits("duplicate", [5]), hits("summary", 12..18)].concat(),
                "ABC notes" => hits("notes", 18..25),
                _ => Vec::new(),
            })
        }

        async fn read_document(&self, document_id: &str) -> Res<String> {
            self.reads.lock().unwrap().push(document_id.to_string());

            let index: u64 = document_id.trim_start_matches("doc-").parse()?;
            tokio::time::sleep(Duration::from_millis(40u64.saturating_sub(index * 2))).await;

            if index == 3 {
                return Ok("Offsite planning".to_string());
            }

            Ok(format!("abc sync {index}"))
        }
    }

    #[tokio::test]
    async fn test_find_meeting_notes_caps_dedupes_and_keeps_order() {
        let drive = Arc::new(FakeDrive::default());
        let docs = DocsClient::new(drive.clone());

        let notes = find_meeting_notes(&docs, "ABC").await;

        // 25 unique hits, capped at 20 reads.
        let mut reads = drive.reads.lock().unwrap().clone();
        reads.sort();
        let mut expected = (0..20).map(|i| format!("doc-{i}")).collect::<Vec<_>>();
        expected.sort();
        assert_eq!(reads, expected);

        // Search order survives concurrent reads; doc-3 does not mention the project.
        let ids = notes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>();
        let expected_ids = (0..20).filter(|i| *i != 3).map(|i| format!("doc-{i}")).collect::<Vec<_>>();
        assert_eq!(ids, expected_ids);

        // The first hit for a duplicated id wins.
        let doc5 = notes.iter().find(|n| n.id == "doc-5").unwrap();
        assert_eq!(doc5.name, "meeting 5");
    }

    #[test]
    fn test_excerpt_is_char_safe() {
        let text = "é".repeat(600);
        let result = excerpt(&text);

        assert_eq!(result.chars().count(), 503);
        assert!(result.ends_with("..."));
    }

    #[tokio::test]
    async fn test_meeting_context_without_llm_quotes_top_three() {
        let notes = (1..=4)
            .map(|i| MeetingNote {
                id: format!("doc-{i}"),
                name: format!("ABC sync {i}"),
                content: format!("Discussed ABC item {i}"),
                modified_time: None,
            })
            .collect::<Vec<_>>();

        let context = meeting_context(None, &notes).await;

        assert!(context.starts_with("\n\n**Recent Meeting Notes:**\n- ABC sync 1: Discussed ABC item 1...\n"));
        assert!(context.contains("- ABC sync 3:"));
        assert!(!context.contains("ABC sync 4"));
    }

    #[tokio::test]
    async fn test_meeting_context_empty() {
        assert_eq!(meeting_context(None, &[]).await, "");
    }
}
