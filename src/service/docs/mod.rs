pub mod auth;
pub mod google;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{DocumentRef, Res};

/// MIME type of native Google Docs.
pub const GOOGLE_DOC_MIME_TYPE: &str = "application/vnd.google-apps.document";

// Traits.

/// Generic document store trait that clients must implement.
///
/// This trait defines the two calls needed to find meeting notes: a name search
/// over stored files, and a plain-text read of one document.
#[async_trait]
pub trait GenericDocsClient: Send + Sync + 'static {
    /// Search for files whose name contains `query`, restricted to `mime_type`.
    async fn search_documents(&self, query: &str, mime_type: &str) -> Res<Vec<DocumentRef>>;

    /// Read the full text content of a document.
    async fn read_document(&self, document_id: &str) -> Res<String>;
}

// Structs.

/// Document client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DocsClient {
    inner: Arc<dyn GenericDocsClient>,
}

impl Deref for DocsClient {
    type Target = dyn GenericDocsClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl DocsClient {
    pub fn new(inner: Arc<dyn GenericDocsClient>) -> Self {
        Self { inner }
    }
}
