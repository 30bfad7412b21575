//! Action handler for operator commands
//!
//! Coordinates between the backend API and the session-owned stores.

use anyhow::{Result, bail};
use log::info;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::{AiAnswer, AiJobcards, Backend};
use crate::models::{Jobcard, JobcardId, JobcardPatch, JobcardStatus, Message, MessageId};
use crate::search::SearchFilter;
use crate::session::SessionState;
use crate::store::{JobcardStore, MessageStore};

/// Notification texts shown after local commands
pub mod notices {
    pub const MESSAGE_DELETED: &str = "Message deleted.";
    pub const MESSAGE_PINNED: &str = "Message pinned!";
    pub const MESSAGE_UNPINNED: &str = "Message unpinned.";
    pub const AI_JOBCARDS_LOADED: &str = "AI jobcards loaded!";
    pub const NO_JOBCARDS: &str = "No jobcards found.";
}

/// Handler for operator commands
///
/// Message delete and pin are local to the session. Everything else is a
/// backend call whose result is then applied locally:
/// 1. Call the backend
/// 2. Replace local state with what the backend returned
///
/// The backend stays the source of truth for jobcards; the local copy is
/// never patched optimistically. Failures are recorded in the session
/// banner before being returned.
pub struct ActionHandler {
    backend: Arc<dyn Backend>,
    messages: Arc<MessageStore>,
    jobcards: Arc<JobcardStore>,
    session: Arc<Mutex<SessionState>>,
}

impl ActionHandler {
    pub fn new(
        backend: Arc<dyn Backend>,
        messages: Arc<MessageStore>,
        jobcards: Arc<JobcardStore>,
        session: Arc<Mutex<SessionState>>,
    ) -> Self {
        Self {
            backend,
            messages,
            jobcards,
            session,
        }
    }

    fn session(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn surface<T>(&self, what: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.session().record_failure(what, e);
        }
        result
    }

    // === Messages ===

    /// Delete a message from this session's view
    ///
    /// The backend is not told; the id stays hidden for the rest of the
    /// session even if it is delivered again.
    pub fn delete_message(&self, id: &MessageId) -> Option<Message> {
        info!("Deleting message {} locally", id);
        let removed = self.messages.remove(id);

        let mut session = self.session();
        session.pinned.remove(id);
        session.notifications.post(notices::MESSAGE_DELETED);
        removed
    }

    /// Toggle a message's pinned state. Returns the new state.
    pub fn toggle_pin(&self, id: &MessageId) -> bool {
        let mut session = self.session();
        let pinned = session.pinned.toggle(id);
        session.notifications.post(if pinned {
            notices::MESSAGE_PINNED
        } else {
            notices::MESSAGE_UNPINNED
        });
        pinned
    }

    /// Run an advanced search and replace the message list with the result
    ///
    /// The filter stays active in the session until the next full snapshot.
    pub fn advanced_search(&self, filter: &SearchFilter) -> Result<usize> {
        info!("Advanced search: {:?}", filter);
        let result = self.backend.search_messages(filter);
        let messages = self.surface("Search", result)?;
        let count = self.messages.replace(messages);
        self.session().search = Some(filter.clone());
        Ok(count)
    }

    /// Ask the AI search a free-text question
    ///
    /// The answer is kept in the session for display; it never touches the
    /// message list.
    pub fn ai_query(&self, query: &str) -> Result<AiAnswer> {
        let query = query.trim();
        if query.is_empty() {
            bail!("AI query is empty");
        }

        info!("AI query: {}", query);
        match self.backend.ai_search(query) {
            Ok(answer) => {
                self.session().ai_result = Some(answer.display());
                Ok(answer)
            }
            Err(e) => {
                let mut session = self.session();
                session.ai_result = Some(format!("Error: {:#}", e));
                session.record_failure("AI search", &e);
                Err(e)
            }
        }
    }

    /// Download the image behind an image message
    pub fn fetch_image(&self, file_id: &str) -> Result<Vec<u8>> {
        let result = self.backend.fetch_image(file_id);
        self.surface("Image download", result)
    }

    // === Jobcards ===

    /// Ask the backend to extract jobcards from recent messages
    ///
    /// Extracted jobcards go in front of the existing ones. Unparseable AI
    /// output is kept in the session as an inline error, not returned as one.
    pub fn load_ai_jobcards(&self) -> Result<AiJobcards> {
        let result = self.backend.ai_jobcards();
        let outcome = self.surface("AI jobcards", result)?;

        let mut session = self.session();
        match &outcome {
            AiJobcards::Extracted(cards) => {
                info!("AI extracted {} jobcards", cards.len());
                self.jobcards.prepend(cards.clone());
                session.ai_error = None;
                session.notifications.post(notices::AI_JOBCARDS_LOADED);
            }
            AiJobcards::Raw(raw) => {
                let raw = match raw {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                session.ai_error = Some(format!(
                    "AI did not return valid jobcards. Raw output: {}",
                    raw
                ));
            }
            AiJobcards::Empty => {
                session.ai_error = Some(notices::NO_JOBCARDS.to_string());
            }
        }
        Ok(outcome)
    }

    /// Create a jobcard by hand
    pub fn create_jobcard(&self, jobcard: &Jobcard) -> Result<Jobcard> {
        let result = self.backend.create_jobcard(jobcard);
        let created = self.surface("Create jobcard", result)?;
        info!(
            "Created jobcard {}",
            created.id.as_ref().map(JobcardId::as_str).unwrap_or("?")
        );
        self.jobcards.prepend(vec![created.clone()]);
        Ok(created)
    }

    pub fn set_jobcard_status(&self, id: &JobcardId, status: JobcardStatus) -> Result<Jobcard> {
        info!("Setting jobcard {} to {}", id, status);
        let result = self.backend.set_jobcard_status(id, status);
        self.apply("Status change", result)
    }

    /// Save edited jobcard fields
    pub fn edit_jobcard(&self, id: &JobcardId, patch: &JobcardPatch) -> Result<Jobcard> {
        if patch.is_empty() {
            bail!("No jobcard fields to update");
        }
        let result = self.backend.update_jobcard(id, patch);
        self.apply("Edit jobcard", result)
    }

    pub fn assign_jobcard(&self, id: &JobcardId, user_id: &str) -> Result<Jobcard> {
        info!("Assigning jobcard {} to {}", id, user_id);
        let result = self.backend.assign_jobcard(id, user_id);
        self.apply("Assign jobcard", result)
    }

    pub fn comment_jobcard(
        &self,
        id: &JobcardId,
        user_id: Option<&str>,
        text: &str,
    ) -> Result<Jobcard> {
        let text = text.trim();
        if text.is_empty() {
            bail!("Comment text is empty");
        }
        let result = self.backend.comment_jobcard(id, user_id, text);
        self.apply("Comment", result)
    }

    pub fn delete_jobcard(&self, id: &JobcardId) -> Result<()> {
        info!("Deleting jobcard {}", id);
        let result = self.backend.delete_jobcard(id);
        self.surface("Delete jobcard", result)?;
        self.jobcards.remove(id);
        Ok(())
    }

    fn apply(&self, what: &str, result: Result<Jobcard>) -> Result<Jobcard> {
        let jobcard = self.surface(what, result)?;
        self.jobcards.apply_canonical(jobcard.clone());
        Ok(jobcard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeBackend;
    use crate::session::DEFAULT_NOTIFICATION_TTL;

    struct Fixture {
        backend: Arc<FakeBackend>,
        messages: Arc<MessageStore>,
        jobcards: Arc<JobcardStore>,
        session: Arc<Mutex<SessionState>>,
        handler: ActionHandler,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(FakeBackend::new());
        let messages = Arc::new(MessageStore::new());
        let jobcards = Arc::new(JobcardStore::new());
        let session = Arc::new(Mutex::new(SessionState::new(DEFAULT_NOTIFICATION_TTL)));
        let handler = ActionHandler::new(
            backend.clone(),
            messages.clone(),
            jobcards.clone(),
            session.clone(),
        );
        Fixture {
            backend,
            messages,
            jobcards,
            session,
            handler,
        }
    }

    fn card(id: &str) -> Jobcard {
        Jobcard {
            id: Some(JobcardId::new(id)),
            title: Some(format!("card {}", id)),
            ..Default::default()
        }
    }

    impl Fixture {
        fn notices(&self) -> Vec<String> {
            let session = self.session.lock().unwrap();
            session
                .notifications
                .active()
                .into_iter()
                .map(String::from)
                .collect()
        }

        fn banner(&self) -> Option<String> {
            self.session.lock().unwrap().banner.clone()
        }
    }

    #[test]
    fn test_delete_is_local_and_unpins() {
        let f = fixture();
        f.messages.replace(vec![Message::builder("m1", "alice").build()]);
        let id = MessageId::new("m1");
        f.handler.toggle_pin(&id);

        assert!(f.handler.delete_message(&id).is_some());
        assert!(f.messages.is_empty());
        assert!(!f.session.lock().unwrap().pinned.contains(&id));
        assert_eq!(f.notices(), vec!["Message deleted."]);
        assert!(f.backend.calls().is_empty());
    }

    #[test]
    fn test_deleted_message_not_resurrected_by_stream() {
        let f = fixture();
        f.messages.replace(vec![Message::builder("m1", "alice").build()]);
        f.handler.delete_message(&MessageId::new("m1"));

        let outcome = f.messages.merge(vec![Message::builder("m1", "alice").build()]);
        assert!(outcome.inserted.is_empty());
        assert!(f.messages.is_empty());
    }

    #[test]
    fn test_toggle_pin_notifies() {
        let f = fixture();
        let id = MessageId::new("m1");

        assert!(f.handler.toggle_pin(&id));
        assert_eq!(f.notices(), vec!["Message pinned!"]);
        assert!(!f.handler.toggle_pin(&id));
        assert_eq!(f.notices(), vec!["Message unpinned."]);
    }

    #[test]
    fn test_advanced_search_replaces_store() {
        let f = fixture();
        f.messages.seed(vec![Message::builder("old", "x").build()]);
        f.backend.with(|s| {
            s.search_result = vec![
                Message::builder("a", "alice").build(),
                Message::builder("b", "bob").build(),
            ]
        });

        let filter = crate::search::parse_query("from:alice");
        assert_eq!(f.handler.advanced_search(&filter).unwrap(), 2);
        assert!(!f.messages.contains(&MessageId::new("old")));
        assert_eq!(
            f.backend.state.lock().unwrap().last_filter.as_ref(),
            Some(&filter)
        );
        assert_eq!(f.session.lock().unwrap().search.as_ref(), Some(&filter));
    }

    #[test]
    fn test_failed_search_keeps_data_and_sets_banner() {
        let f = fixture();
        f.messages.seed(vec![Message::builder("old", "x").build()]);
        f.backend.with(|s| s.fail_with = Some("connection refused".to_string()));

        assert!(f.handler.advanced_search(&SearchFilter::default()).is_err());
        assert_eq!(f.messages.len(), 1);
        assert!(f.session.lock().unwrap().search.is_none());
        assert_eq!(
            f.banner().as_deref(),
            Some("Search failed: connection refused")
        );
    }

    #[test]
    fn test_ai_query_error_is_inline() {
        let f = fixture();
        f.backend
            .with(|s| s.ai_answer = Some(AiAnswer::Error("model unavailable".to_string())));

        let answer = f.handler.ai_query("who shot a kudu?").unwrap();
        assert_eq!(answer, AiAnswer::Error("model unavailable".to_string()));
        assert_eq!(
            f.session.lock().unwrap().ai_result.as_deref(),
            Some("Error: model unavailable")
        );
        assert!(f.messages.is_empty());
    }

    #[test]
    fn test_ai_query_rejects_blank() {
        let f = fixture();
        assert!(f.handler.ai_query("   ").is_err());
        assert!(f.backend.calls().is_empty());
    }

    #[test]
    fn test_ai_jobcards_prepended() {
        let f = fixture();
        f.jobcards.replace_all(vec![card("old")]);
        f.backend
            .with(|s| s.ai_jobcards = Some(AiJobcards::Extracted(vec![card("ai1"), card("ai2")])));

        f.handler.load_ai_jobcards().unwrap();
        let ids: Vec<String> = f
            .jobcards
            .all()
            .into_iter()
            .filter_map(|j| j.id.map(|id| id.as_str().to_string()))
            .collect();
        assert_eq!(ids, vec!["ai1", "ai2", "old"]);
        assert_eq!(f.notices(), vec!["AI jobcards loaded!"]);
    }

    #[test]
    fn test_ai_jobcards_raw_output_surfaced() {
        let f = fixture();
        f.backend.with(|s| {
            s.ai_jobcards = Some(AiJobcards::Raw(serde_json::Value::String(
                "I could not find any".to_string(),
            )))
        });

        f.handler.load_ai_jobcards().unwrap();
        assert_eq!(
            f.session.lock().unwrap().ai_error.as_deref(),
            Some("AI did not return valid jobcards. Raw output: I could not find any")
        );
        assert!(f.jobcards.is_empty());
    }

    #[test]
    fn test_ai_jobcards_empty() {
        let f = fixture();
        f.handler.load_ai_jobcards().unwrap();
        assert_eq!(
            f.session.lock().unwrap().ai_error.as_deref(),
            Some("No jobcards found.")
        );
    }

    #[test]
    fn test_status_change_applies_canonical() {
        let f = fixture();
        f.backend.with(|s| s.jobcards = vec![card("j1")]);
        f.jobcards.replace_all(vec![card("j1")]);

        let id = JobcardId::new("j1");
        let updated = f.handler.set_jobcard_status(&id, JobcardStatus::Done).unwrap();
        assert_eq!(updated.status, JobcardStatus::Done);
        assert_eq!(f.jobcards.get(&id).unwrap().status, JobcardStatus::Done);
        assert!(f.jobcards.get(&id).unwrap().updated_at.is_some());
    }

    #[test]
    fn test_failed_status_change_leaves_local_copy() {
        let f = fixture();
        f.jobcards.replace_all(vec![card("j1")]);

        let id = JobcardId::new("j1");
        assert!(f.handler.set_jobcard_status(&id, JobcardStatus::Done).is_err());
        assert_eq!(f.jobcards.get(&id).unwrap().status, JobcardStatus::Open);
        assert!(f.banner().unwrap().starts_with("Status change failed"));
    }

    #[test]
    fn test_comment_and_assign() {
        let f = fixture();
        f.backend.with(|s| s.jobcards = vec![card("j1")]);
        f.jobcards.replace_all(vec![card("j1")]);
        let id = JobcardId::new("j1");

        f.handler.comment_jobcard(&id, Some("u1"), " on my way ").unwrap();
        f.handler.assign_jobcard(&id, "u2").unwrap();

        let local = f.jobcards.get(&id).unwrap();
        assert_eq!(local.comments.len(), 1);
        assert_eq!(local.comments[0].text, "on my way");
        assert_eq!(local.assigned_to.as_ref().map(|u| u.id()), Some("u2"));

        assert!(f.handler.comment_jobcard(&id, None, "  ").is_err());
    }

    #[test]
    fn test_edit_requires_fields() {
        let f = fixture();
        let id = JobcardId::new("j1");
        assert!(f.handler.edit_jobcard(&id, &JobcardPatch::default()).is_err());
        assert!(f.backend.calls().is_empty());
    }

    #[test]
    fn test_create_and_delete_jobcard() {
        let f = fixture();
        let created = f
            .handler
            .create_jobcard(&Jobcard {
                title: Some("Pickup".to_string()),
                ..Default::default()
            })
            .unwrap();
        let id = created.id.clone().unwrap();
        assert_eq!(f.jobcards.len(), 1);

        f.handler.delete_jobcard(&id).unwrap();
        assert!(f.jobcards.is_empty());
    }
}
