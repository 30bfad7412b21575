//! In-memory backend for unit tests

use anyhow::{Result, bail};
use chrono::Utc;
use std::io::Cursor;
use std::sync::{Mutex, PoisonError};

use super::{AiAnswer, AiJobcards, Backend};
use crate::models::{
    Comment, Jobcard, JobcardId, JobcardPatch, JobcardStatus, Message, User, UserRef,
};
use crate::search::SearchFilter;
use crate::stream::EventStream;

#[derive(Default)]
pub struct FakeState {
    pub messages: Vec<Message>,
    pub search_result: Vec<Message>,
    pub users: Vec<User>,
    pub jobcards: Vec<Jobcard>,
    pub ai_answer: Option<AiAnswer>,
    pub ai_jobcards: Option<AiJobcards>,
    pub stream_body: String,
    /// When set, every call fails with this message
    pub fail_with: Option<String>,
    /// Names of the calls made, in order
    pub calls: Vec<String>,
    pub last_filter: Option<SearchFilter>,
}

#[derive(Default)]
pub struct FakeBackend {
    pub state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F: FnOnce(&mut FakeState)>(&self, f: F) {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn calls(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
            .clone()
    }

    fn enter(&self, call: &str) -> Result<std::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.calls.push(call.to_string());
        if let Some(err) = &state.fail_with {
            bail!("{}", err);
        }
        Ok(state)
    }

    fn mutate<F>(&self, call: &str, id: &JobcardId, f: F) -> Result<Jobcard>
    where
        F: FnOnce(&mut Jobcard),
    {
        let mut state = self.enter(call)?;
        let Some(card) = state
            .jobcards
            .iter_mut()
            .find(|j| j.id.as_ref() == Some(id))
        else {
            bail!("Jobcard not found");
        };
        f(card);
        card.updated_at = Some(Utc::now());
        Ok(card.clone())
    }
}

impl Backend for FakeBackend {
    fn list_messages(&self) -> Result<Vec<Message>> {
        Ok(self.enter("list_messages")?.messages.clone())
    }

    fn search_messages(&self, filter: &SearchFilter) -> Result<Vec<Message>> {
        let mut state = self.enter("search_messages")?;
        state.last_filter = Some(filter.clone());
        Ok(state.search_result.clone())
    }

    fn ai_search(&self, query: &str) -> Result<AiAnswer> {
        let state = self.enter("ai_search")?;
        Ok(state
            .ai_answer
            .clone()
            .unwrap_or_else(|| AiAnswer::Result(format!("answer to {}", query))))
    }

    fn fetch_image(&self, file_id: &str) -> Result<Vec<u8>> {
        self.enter("fetch_image")?;
        Ok(file_id.as_bytes().to_vec())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.enter("list_users")?.users.clone())
    }

    fn list_jobcards(&self) -> Result<Vec<Jobcard>> {
        Ok(self.enter("list_jobcards")?.jobcards.clone())
    }

    fn ai_jobcards(&self) -> Result<AiJobcards> {
        Ok(self
            .enter("ai_jobcards")?
            .ai_jobcards
            .clone()
            .unwrap_or(AiJobcards::Empty))
    }

    fn create_jobcard(&self, jobcard: &Jobcard) -> Result<Jobcard> {
        let mut state = self.enter("create_jobcard")?;
        let mut created = jobcard.clone();
        created.id = Some(JobcardId::new(format!("jc{}", state.jobcards.len() + 1)));
        created.created_at = Some(Utc::now());
        state.jobcards.push(created.clone());
        Ok(created)
    }

    fn set_jobcard_status(&self, id: &JobcardId, status: JobcardStatus) -> Result<Jobcard> {
        self.mutate("set_jobcard_status", id, |j| j.status = status)
    }

    fn update_jobcard(&self, id: &JobcardId, patch: &JobcardPatch) -> Result<Jobcard> {
        let patch = patch.clone();
        self.mutate("update_jobcard", id, move |j| {
            if let Some(title) = patch.title {
                j.title = Some(title);
            }
            if let Some(location) = patch.location {
                j.location = Some(location);
            }
            if let Some(when) = patch.when {
                j.when = Some(when);
            }
        })
    }

    fn assign_jobcard(&self, id: &JobcardId, user_id: &str) -> Result<Jobcard> {
        let user = UserRef::Id(user_id.to_string());
        self.mutate("assign_jobcard", id, move |j| j.assigned_to = Some(user))
    }

    fn comment_jobcard(
        &self,
        id: &JobcardId,
        user_id: Option<&str>,
        text: &str,
    ) -> Result<Jobcard> {
        let comment = Comment {
            user: user_id.map(|u| UserRef::Id(u.to_string())),
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        self.mutate("comment_jobcard", id, move |j| j.comments.push(comment))
    }

    fn delete_jobcard(&self, id: &JobcardId) -> Result<()> {
        let mut state = self.enter("delete_jobcard")?;
        state.jobcards.retain(|j| j.id.as_ref() != Some(id));
        Ok(())
    }

    fn open_stream(&self) -> Result<EventStream> {
        let state = self.enter("open_stream")?;
        Ok(EventStream::new(Cursor::new(state.stream_body.clone().into_bytes())))
    }
}
