//! Library root for `helios`.
//!
//! Helios is an LLM-assisted project status assistant designed to:
//! - Fetch a project's epics, stories, and tasks from Jira
//! - Find related meeting notes in Google Drive
//! - Summarize status, roadmap risks, and meetings, and answer questions
//! - Render the results in a web UI with charts
//!
//! The architecture is built around extensible traits that allow for
//! different implementations of each service.

pub mod base;
pub mod check;
pub mod interaction;
pub mod prelude;
pub mod runtime;
pub mod service;
pub mod web;

use base::{config::Config, types::Void};
use tracing::info;

/// Public async entry for the binary crate.
///
/// Serves the web UI on the configured bind address; services are created
/// per session when the user initializes it.
pub async fn start(config: Config) -> Void {
    info!("Starting helios ...");

    web::serve(config).await
}
