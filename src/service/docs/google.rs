//! Google Drive v3 search and Google Docs v1 reads.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use crate::base::{
    config::Config,
    types::{DocumentRef, Res},
};

use super::{DocsClient, GenericDocsClient, auth::GoogleAuth};

/// Maximum files returned per Drive search.
const PAGE_SIZE: &str = "50";

/// Fields requested from `files.list`.
const FILE_FIELDS: &str = "files(id, name, mimeType, createdTime, modifiedTime, owners)";

// Extra methods on `DocsClient` applied by the Google implementation.

impl DocsClient {
    /// Authorize against Google (possibly interactively) and create a Drive/Docs client.
    pub async fn google(config: &Config) -> Res<Self> {
        let auth = GoogleAuth::authorize(
            Path::new(&config.google_drive_credentials_file),
            Path::new(&config.google_drive_token_file),
            std::time::Duration::from_secs(config.google_auth_timeout_secs),
        )
        .await?;
        let client = GoogleDocsClient::new(auth, &config.google_drive_base_url, &config.google_docs_base_url);

        Ok(Self { inner: Arc::new(client) })
    }
}

// Wire types.

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    created_time: Option<String>,
    #[serde(default)]
    modified_time: Option<String>,
}

impl From<DriveFile> for DocumentRef {
    fn from(file: DriveFile) -> Self {
        Self {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            created_time: file.created_time,
            modified_time: file.modified_time,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub body: Option<Body>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Body {
    #[serde(default)]
    pub content: Vec<StructuralElement>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StructuralElement {
    #[serde(default)]
    pub paragraph: Option<Paragraph>,
    #[serde(default)]
    pub table: Option<Table>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub elements: Vec<ParagraphElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphElement {
    #[serde(default)]
    pub text_run: Option<TextRun>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextRun {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default)]
    pub table_rows: Vec<TableRow>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    #[serde(default)]
    pub table_cells: Vec<TableCell>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub content: Vec<StructuralElement>,
}

/// Concatenate every paragraph text run, descending into table cells.
pub fn document_text(document: &Document) -> String {
    fn collect(element: &StructuralElement, out: &mut String) {
        if let Some(paragraph) = &element.paragraph {
            for run in paragraph.elements.iter().filter_map(|e| e.text_run.as_ref()) {
                out.push_str(&run.content);
            }
        } else if let Some(table) = &element.table {
            for cell in table.table_rows.iter().flat_map(|row| row.table_cells.iter()) {
                for inner in &cell.content {
                    collect(inner, out);
                }
            }
        }
    }

    let mut text = String::new();

    if let Some(body) = &document.body {
        for element in &body.content {
            collect(element, &mut text);
        }
    }

    text
}

/// Escape a value for use inside a single-quoted Drive query literal.
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

// Specific implementations.

/// Google Drive/Docs client implementation.
pub struct GoogleDocsClient {
    http: reqwest::Client,
    auth: GoogleAuth,
    drive_base_url: String,
    docs_base_url: String,
}

impl GoogleDocsClient {
    pub fn new(auth: GoogleAuth, drive_base_url: &str, docs_base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth,
            drive_base_url: drive_base_url.trim_end_matches('/').to_string(),
            docs_base_url: docs_base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Res<T> {
        let token = self.auth.access_token().await?;
        let response = self.http.get(url).bearer_auth(token).query(query).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(anyhow::anyhow!("{status}: {text}"));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl GenericDocsClient for GoogleDocsClient {
    #[instrument(name = "GoogleDocsClient::search_documents", skip(self))]
    async fn search_documents(&self, query: &str, mime_type: &str) -> Res<Vec<DocumentRef>> {
        let q = format!("name contains '{}' and mimeType='{}'", escape_query_literal(query), escape_query_literal(mime_type));
        let url = format!("{}/files", self.drive_base_url);

        let list: FileList = self
            .get(&url, &[("q", q.as_str()), ("pageSize", PAGE_SIZE), ("fields", FILE_FIELDS)])
            .await
            .map_err(|err| anyhow::anyhow!("Failed to search documents: {err}"))?;

        debug!("Drive search `{query}` matched {} files", list.files.len());

        Ok(list.files.into_iter().map(DocumentRef::from).collect())
    }

    #[instrument(name = "GoogleDocsClient::read_document", skip(self))]
    async fn read_document(&self, document_id: &str) -> Res<String> {
        let url = document_url(&self.docs_base_url, document_id)?;

        let document: Document = self
            .get(url.as_str(), &[])
            .await
            .map_err(|err| anyhow::anyhow!("Failed to read document {document_id}: {err}"))?;

        Ok(document_text(&document))
    }
}

/// `{docs_base_url}/documents/{id}` with the id percent-encoded.
fn document_url(docs_base_url: &str, document_id: &str) -> Res<reqwest::Url> {
    let mut url = reqwest::Url::parse(docs_base_url).map_err(|err| anyhow::anyhow!("Invalid Docs base URL `{docs_base_url}`: {err}"))?;

    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Invalid Docs base URL `{docs_base_url}`"))?
        .pop_if_empty()
        .push("documents")
        .push(document_id);

    Ok(url)
}

// Tests.
