//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services helios talks to:
//! - Issue tracking (Jira Cloud REST v3)
//! - Document storage (Google Drive and Google Docs)
//! - LLM services (Gemini, OpenAI)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod docs;
pub mod jira;
pub mod llm;
