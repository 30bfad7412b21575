//! Jobcard model: a structured task extracted or authored from chat content

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Platform, UserRef};

/// Unique identifier for a jobcard (backend-assigned `_id`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobcardId(pub String);

impl JobcardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobcardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobcardId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for JobcardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Workflow status of a jobcard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JobcardStatus {
    #[default]
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "done")]
    Done,
}

impl JobcardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobcardStatus::Open => "open",
            JobcardStatus::InProgress => "in progress",
            JobcardStatus::Done => "done",
        }
    }

    /// Parse a status; accepts `in-progress` and `in_progress` as well
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], " ").as_str() {
            "open" => Some(JobcardStatus::Open),
            "in progress" => Some(JobcardStatus::InProgress),
            "done" => Some(JobcardStatus::Done),
            _ => None,
        }
    }
}

impl fmt::Display for JobcardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comment on a jobcard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub user: Option<UserRef>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A structured task record
///
/// All descriptive fields are free text and may be missing; AI extraction
/// frequently leaves gaps that the UI highlights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Jobcard {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JobcardId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub who: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub what: Option<String>,
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trophy_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub status: JobcardStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserRef>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Jobcard {
    /// The seven extraction fields in display order, with their labels
    pub fn fields(&self) -> [(&'static str, Option<&str>); 7] {
        [
            ("Who", self.who.as_deref()),
            ("What", self.what.as_deref()),
            ("Where", self.location.as_deref()),
            ("When", self.when.as_deref()),
            ("Trophy Details", self.trophy_details.as_deref()),
            ("Contact Info", self.contact_info.as_deref()),
            ("Special Instructions", self.special_instructions.as_deref()),
        ]
    }

    /// Labels of extraction fields that are missing or blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, value)| value.is_none_or(|v| v.trim().is_empty()))
            .map(|(label, _)| label)
            .collect()
    }
}

/// Editable jobcard fields for `PUT /jobcards/{id}`
///
/// Only fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobcardPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub who: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub what: Option<String>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trophy_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

impl JobcardPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
