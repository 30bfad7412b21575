//! Per-dashboard session state
//!
//! Everything the operator toggles while using the dashboard lives here:
//! the text filter, dark mode, pinned messages, the selected calendar date,
//! the open sender profile, transient notifications and the error banner.
//! None of it is persisted or sent to the backend.

use chrono::NaiveDate;
use log::warn;
use std::time::{Duration, Instant};

use crate::models::MessageId;
use crate::search::SearchFilter;

/// Default lifetime of a transient notification
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_millis(2000);

/// Ordered set of pinned message ids (pin order preserved)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PinnedSet {
    ids: Vec<MessageId>,
}

impl PinnedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the id if absent, unpin it if present. Returns the new pinned state.
    pub fn toggle(&mut self, id: &MessageId) -> bool {
        if let Some(pos) = self.ids.iter().position(|p| p == id) {
            self.ids.remove(pos);
            false
        } else {
            self.ids.push(id.clone());
            true
        }
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    pub fn remove(&mut self, id: &MessageId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|p| p != id);
        self.ids.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageId> {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Notification {
    text: String,
    posted_at: Instant,
}

/// Short-lived status messages that dismiss themselves
///
/// Posting replaces whatever is showing, matching the single notification
/// strip of the dashboard.
#[derive(Debug, Clone)]
pub struct Notifications {
    ttl: Duration,
    entries: Vec<Notification>,
}

impl Notifications {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Vec::new(),
        }
    }

    pub fn post(&mut self, text: impl Into<String>) {
        self.post_at(text, Instant::now());
    }

    pub fn post_at(&mut self, text: impl Into<String>, now: Instant) {
        self.entries = vec![Notification {
            text: text.into(),
            posted_at: now,
        }];
    }

    /// Notifications still visible at `now`
    pub fn active_at(&self, now: Instant) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|n| now.saturating_duration_since(n.posted_at) < self.ttl)
            .map(|n| n.text.as_str())
            .collect()
    }

    pub fn active(&self) -> Vec<&str> {
        self.active_at(Instant::now())
    }

    /// Drop expired notifications
    pub fn prune_at(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|n| now.saturating_duration_since(n.posted_at) < ttl);
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TTL)
    }
}

/// UI state for one dashboard instance
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Free-text filter applied to the message list
    pub filter: String,
    pub dark_mode: bool,
    pub pinned: PinnedSet,
    /// Calendar date whose messages are listed
    pub selected_date: Option<NaiveDate>,
    /// Sender whose profile is open
    pub profile: Option<String>,
    pub notifications: Notifications,
    /// Last failure, shown until dismissed
    pub banner: Option<String>,
    /// Last AI answer or inline AI error
    pub ai_result: Option<String>,
    /// Last AI jobcard extraction error
    pub ai_error: Option<String>,
    /// Advanced search whose result the message list currently shows
    pub search: Option<SearchFilter>,
}

impl SessionState {
    pub fn new(notification_ttl: Duration) -> Self {
        Self {
            notifications: Notifications::new(notification_ttl),
            ..Default::default()
        }
    }

    /// Flip dark mode, returning the new value
    pub fn toggle_dark_mode(&mut self) -> bool {
        self.dark_mode = !self.dark_mode;
        self.dark_mode
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    pub fn select_date(&mut self, date: Option<NaiveDate>) {
        self.selected_date = date;
    }

    pub fn show_profile(&mut self, sender: Option<String>) {
        self.profile = sender;
    }

    /// Surface a failed operation in the banner
    pub fn record_failure(&mut self, what: &str, err: &anyhow::Error) {
        warn!("{} failed: {:#}", what, err);
        self.banner = Some(format!("{} failed: {:#}", what, err));
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }
}
