//! The chat engine: turning user questions into project reports.
//!
//! This module coordinates the services for each user interaction:
//! - Resolving the project a question is about
//! - Fetching and aggregating Jira data, and finding meeting notes
//! - Composing data-driven or LLM answers, and follow-ups
//! - Summarizing issues and planning tickets from meeting notes

pub mod charts;
pub mod meeting_notes;
pub mod project;
pub mod project_key;
pub mod query;
pub mod tickets;

pub use query::{answer_followup, process_query};
