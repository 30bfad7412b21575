//! Jobcard collection owned by the dashboard session

use log::warn;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::{Jobcard, JobcardId};

/// Local copy of the jobcards, newest additions first
///
/// Entries are only ever replaced with the backend's canonical
/// representation; nothing is patched locally.
pub struct JobcardStore {
    jobcards: RwLock<Vec<Jobcard>>,
}

impl JobcardStore {
    pub fn new() -> Self {
        Self {
            jobcards: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Jobcard>> {
        self.jobcards.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Jobcard>> {
        self.jobcards.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole collection
    pub fn replace_all(&self, jobcards: Vec<Jobcard>) {
        *self.write() = jobcards;
    }

    /// Put newly extracted or created jobcards in front of the existing ones
    pub fn prepend(&self, jobcards: Vec<Jobcard>) {
        let mut current = self.write();
        let existing = std::mem::take(&mut *current);
        *current = jobcards;
        current.extend(existing);
    }

    /// Swap in the canonical version of a jobcard returned by the backend
    ///
    /// Matches by id; an unknown jobcard is prepended.
    pub fn apply_canonical(&self, jobcard: Jobcard) {
        let mut current = self.write();
        let slot = jobcard
            .id
            .as_ref()
            .and_then(|id| current.iter().position(|j| j.id.as_ref() == Some(id)));

        match slot {
            Some(pos) => {
                if jobcard.comments.len() < current[pos].comments.len() {
                    warn!(
                        "Backend returned {} comments for jobcard {}, local copy had {}",
                        jobcard.comments.len(),
                        jobcard.id.as_ref().map(JobcardId::as_str).unwrap_or("?"),
                        current[pos].comments.len()
                    );
                }
                current[pos] = jobcard;
            }
            None => current.insert(0, jobcard),
        }
    }

    /// Remove a jobcard by id
    pub fn remove(&self, id: &JobcardId) -> Option<Jobcard> {
        let mut current = self.write();
        let pos = current.iter().position(|j| j.id.as_ref() == Some(id))?;
        Some(current.remove(pos))
    }

    pub fn get(&self, id: &JobcardId) -> Option<Jobcard> {
        self.read()
            .iter()
            .find(|j| j.id.as_ref() == Some(id))
            .cloned()
    }

    pub fn all(&self) -> Vec<Jobcard> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobcardStore {
    fn default() -> Self {
        Self::new()
    }
}
