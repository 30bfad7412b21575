//! User model for operators and jobcard assignees

use serde::{Deserialize, Serialize};

/// An operator or assignee, sourced from the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            display_name: None,
            email: None,
            role: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Name to show in lists: display name if set, otherwise username
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }
}

/// Reference to a user as returned by the backend
///
/// Populated references carry the whole user object; unpopulated ones are
/// just the user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Populated(User),
    Id(String),
}

impl UserRef {
    pub fn id(&self) -> &str {
        match self {
            UserRef::Populated(user) => &user.id,
            UserRef::Id(id) => id,
        }
    }

    /// Resolve a display label, looking up bare ids in the known users
    pub fn label<'a>(&'a self, users: &'a [User]) -> &'a str {
        match self {
            UserRef::Populated(user) => user.label(),
            UserRef::Id(id) => users
                .iter()
                .find(|u| &u.id == id)
                .map(User::label)
                .unwrap_or(id.as_str()),
        }
    }
}
