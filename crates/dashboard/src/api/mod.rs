//! Backend REST/event API integration
//!
//! This module provides:
//! - The [`Backend`] trait the rest of the crate talks to
//! - [`BackendClient`], the HTTP implementation
//! - Request/response wire types

mod client;
#[cfg(test)]
pub(crate) mod fake;
mod transport;

pub use client::{BackendClient, StatusError};
pub use transport::{SocketHandle, StreamConnector};

use anyhow::Result;

use crate::models::{Jobcard, JobcardId, JobcardPatch, JobcardStatus, Message, User};
use crate::search::SearchFilter;
use crate::stream::EventStream;

/// Answer from the AI free-text search
#[derive(Debug, Clone, PartialEq)]
pub enum AiAnswer {
    /// Opaque result, shown verbatim
    Result(String),
    /// Error reported by the AI service
    Error(String),
}

impl AiAnswer {
    /// Text as shown to the operator
    pub fn display(&self) -> String {
        match self {
            AiAnswer::Result(text) => text.clone(),
            AiAnswer::Error(err) => format!("Error: {}", err),
        }
    }
}

/// Outcome of asking the backend for AI-extracted jobcards
#[derive(Debug, Clone, PartialEq)]
pub enum AiJobcards {
    /// Structured jobcards were extracted
    Extracted(Vec<Jobcard>),
    /// The AI output could not be parsed; this is what it said
    Raw(serde_json::Value),
    /// Neither jobcards nor raw output came back
    Empty,
}

/// Operations the dashboard needs from the backend
///
/// Every jobcard mutation returns the backend's canonical jobcard.
pub trait Backend: Send + Sync {
    /// Full message collection
    fn list_messages(&self) -> Result<Vec<Message>>;

    /// Filtered message collection
    fn search_messages(&self, filter: &SearchFilter) -> Result<Vec<Message>>;

    /// Natural-language query against the AI search endpoint
    fn ai_search(&self, query: &str) -> Result<AiAnswer>;

    /// Raw image bytes for an image message
    fn fetch_image(&self, file_id: &str) -> Result<Vec<u8>>;

    fn list_users(&self) -> Result<Vec<User>>;

    fn list_jobcards(&self) -> Result<Vec<Jobcard>>;

    fn ai_jobcards(&self) -> Result<AiJobcards>;

    fn create_jobcard(&self, jobcard: &Jobcard) -> Result<Jobcard>;

    fn set_jobcard_status(&self, id: &JobcardId, status: JobcardStatus) -> Result<Jobcard>;

    fn update_jobcard(&self, id: &JobcardId, patch: &JobcardPatch) -> Result<Jobcard>;

    fn assign_jobcard(&self, id: &JobcardId, user_id: &str) -> Result<Jobcard>;

    fn comment_jobcard(&self, id: &JobcardId, user_id: Option<&str>, text: &str)
    -> Result<Jobcard>;

    fn delete_jobcard(&self, id: &JobcardId) -> Result<()>;

    /// Open the server-sent events stream of message batches
    fn open_stream(&self) -> Result<EventStream>;
}

/// Backend API wire types
pub mod wire {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    use super::AiJobcards;
    use crate::models::{Jobcard, JobcardStatus};

    #[derive(Debug, Serialize)]
    pub struct AiSearchRequest<'a> {
        pub query: &'a str,
    }

    /// `{result}` on success, `{error}` on failure
    #[derive(Debug, Deserialize)]
    pub struct AiSearchResponse {
        pub result: Option<serde_json::Value>,
        pub error: Option<String>,
    }

    /// `{jobcards: [...]}` when extraction worked, `{raw: ...}` when it did not
    #[derive(Debug, Deserialize)]
    pub struct AiJobcardsResponse {
        pub jobcards: Option<Value>,
        pub raw: Option<Value>,
    }

    impl AiJobcardsResponse {
        /// Jobcards count only when they come as an array; anything else
        /// falls through to the raw output.
        pub fn into_outcome(self) -> serde_json::Result<AiJobcards> {
            if let Some(cards @ Value::Array(_)) = self.jobcards {
                let cards: Vec<Jobcard> = serde_json::from_value(cards)?;
                return Ok(AiJobcards::Extracted(cards));
            }
            Ok(match self.raw {
                None | Some(Value::Null) => AiJobcards::Empty,
                Some(Value::String(s)) if s.is_empty() => AiJobcards::Empty,
                Some(raw) => AiJobcards::Raw(raw),
            })
        }
    }

    #[derive(Debug, Serialize)]
    pub struct StatusRequest {
        pub status: JobcardStatus,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AssignRequest<'a> {
        pub user_id: &'a str,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CommentRequest<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub user_id: Option<&'a str>,
        pub text: &'a str,
    }

    /// Error body some endpoints return alongside a non-2xx status
    #[derive(Debug, Deserialize)]
    pub struct ErrorBody {
        pub error: Option<String>,
        pub message: Option<String>,
    }
}
