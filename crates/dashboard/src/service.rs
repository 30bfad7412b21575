//! Dashboard session service
//!
//! [`Dashboard`] owns one operator session: the message store, the jobcard
//! collection, the known users, the session state and the live update
//! subscription. Front ends talk to it and nothing else.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::actions::ActionHandler;
use crate::api::{Backend, BackendClient};
use crate::config::DashboardConfig;
use crate::models::{Jobcard, Message, User};
use crate::session::SessionState;
use crate::store::{JobcardStore, MergeOutcome, MessageStore};
use crate::stream::{self, ChannelEvent, Subscription};
use crate::views::{self, SenderProfile};

/// What the live channel did, as reported to a subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum LiveUpdate {
    /// New messages were folded into the store
    Merged(MergeOutcome),
    /// Connection lifecycle change
    Status(ChannelEvent),
}

/// Counts from a full (re)load; `None` where that read failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub messages: Option<usize>,
    pub users: Option<usize>,
    pub jobcards: Option<usize>,
}

/// One operator's dashboard
pub struct Dashboard {
    config: DashboardConfig,
    backend: Arc<dyn Backend>,
    messages: Arc<MessageStore>,
    jobcards: Arc<JobcardStore>,
    users: RwLock<Vec<User>>,
    session: Arc<Mutex<SessionState>>,
    actions: ActionHandler,
    subscription: Mutex<Option<Subscription>>,
}

impl Dashboard {
    pub fn new(backend: Arc<dyn Backend>, config: DashboardConfig) -> Self {
        let messages = Arc::new(MessageStore::new());
        let jobcards = Arc::new(JobcardStore::new());
        let session = Arc::new(Mutex::new(SessionState::new(config.notification_ttl())));
        let actions = ActionHandler::new(
            backend.clone(),
            messages.clone(),
            jobcards.clone(),
            session.clone(),
        );

        Self {
            config,
            backend,
            messages,
            jobcards,
            users: RwLock::new(Vec::new()),
            session,
            actions,
            subscription: Mutex::new(None),
        }
    }

    /// Create a dashboard talking HTTP to the configured backend
    pub fn connect(config: DashboardConfig) -> Result<Self> {
        let client = BackendClient::new(&config.api_url, config.request_timeout())?;
        info!("Using backend at {}", client.base_url());
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Operator commands
    pub fn actions(&self) -> &ActionHandler {
        &self.actions
    }

    // === Loading ===

    /// Load messages, users and jobcards
    ///
    /// Each read is independent; a failure is surfaced in the banner and the
    /// other reads still run.
    pub fn start(&self) -> LoadSummary {
        let summary = LoadSummary {
            messages: self.load_snapshot().ok(),
            users: self.load_users().ok(),
            jobcards: self.load_jobcards().ok(),
        };
        info!("Dashboard loaded: {:?}", summary);
        summary
    }

    /// Same as [`Dashboard::start`]; the operator's explicit refresh
    pub fn reload(&self) -> LoadSummary {
        self.start()
    }

    /// Replace the message list with a fresh snapshot
    ///
    /// This also ends any advanced search the list was showing.
    pub fn load_snapshot(&self) -> Result<usize> {
        let result = self.backend.list_messages();
        let messages = self.surface("Loading messages", result)?;
        let count = self.messages.seed(messages);
        self.session().search = None;
        info!("Loaded {} messages", count);
        Ok(count)
    }

    pub fn load_users(&self) -> Result<usize> {
        let result = self.backend.list_users();
        let users = self.surface("Loading users", result)?;
        let count = users.len();
        *self.users.write().unwrap_or_else(PoisonError::into_inner) = users;
        Ok(count)
    }

    pub fn load_jobcards(&self) -> Result<usize> {
        let result = self.backend.list_jobcards();
        let jobcards = self.surface("Loading jobcards", result)?;
        let count = jobcards.len();
        self.jobcards.replace_all(jobcards);
        Ok(count)
    }

    fn surface<T>(&self, what: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.session().record_failure(what, e);
        }
        result
    }

    // === Live updates ===

    /// Open the live update channel
    ///
    /// Batches are merged into the message store on the channel's thread and
    /// then reported to `observer`. After a reconnect the list is fetched
    /// again and merged, so batches missed while disconnected show up: the
    /// snapshot normally, or the active advanced search so its result is not
    /// widened. Replaces (and closes) any earlier subscription.
    pub fn subscribe_live<F>(&self, observer: F) -> Result<()>
    where
        F: Fn(&LiveUpdate) + Send + 'static,
    {
        let backend = self.backend.clone();
        let connect = move || backend.open_stream();

        let backend = self.backend.clone();
        let messages = self.messages.clone();
        let session = self.session.clone();
        let sink = move |event: ChannelEvent| match event {
            ChannelEvent::Batch(batch) => {
                let outcome = messages.merge(batch);
                if !outcome.is_empty() {
                    debug!("Merged {} live messages", outcome.inserted.len());
                    observer(&LiveUpdate::Merged(outcome));
                }
            }
            ChannelEvent::Connected { reconnect: true } => {
                observer(&LiveUpdate::Status(event));
                let search = lock(&session).search.clone();
                let missed = match &search {
                    Some(filter) => backend.search_messages(filter),
                    None => backend.list_messages(),
                };
                match missed {
                    Ok(missed) => {
                        let outcome = messages.merge(missed);
                        info!("Resynced after reconnect: {} new", outcome.inserted.len());
                        if !outcome.is_empty() {
                            observer(&LiveUpdate::Merged(outcome));
                        }
                    }
                    Err(e) => lock(&session).record_failure("Resync", &e),
                }
            }
            ChannelEvent::GaveUp { attempts } => {
                lock(&session).record_failure(
                    "Live updates",
                    &anyhow!("gave up after {} attempts", attempts),
                );
                observer(&LiveUpdate::Status(event));
            }
            other => observer(&LiveUpdate::Status(other)),
        };

        let subscription = stream::subscribe(connect, self.config.reconnect.policy(), sink)?;
        let previous = lock(&self.subscription).replace(subscription);
        if let Some(previous) = previous {
            warn!("Replacing existing live subscription");
            previous.close();
        }
        Ok(())
    }

    /// Close the live channel, if open
    pub fn unsubscribe(&self) {
        if let Some(subscription) = lock(&self.subscription).take() {
            subscription.close();
        }
    }

    /// Whether a live channel is open and its thread still running
    pub fn is_live(&self) -> bool {
        lock(&self.subscription)
            .as_ref()
            .is_some_and(|s| !s.is_closed() && !s.is_finished())
    }

    // === Views ===

    /// All messages, newest first
    pub fn messages(&self) -> Vec<Message> {
        self.messages.all()
    }

    pub fn message_store(&self) -> &MessageStore {
        &self.messages
    }

    /// Messages matching the session's text filter
    pub fn filtered(&self) -> Vec<Message> {
        let filter = self.session().filter.clone();
        let all = self.messages.all();
        views::filter_messages(&all, &filter)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn profile(&self, sender: &str) -> SenderProfile {
        views::sender_profile(
            &self.messages.all(),
            sender,
            self.config.profile_recent_limit,
        )
    }

    /// Profile of the sender selected in the session
    pub fn selected_profile(&self) -> Option<SenderProfile> {
        let sender = self.session().profile.clone()?;
        Some(self.profile(&sender))
    }

    /// Messages on a calendar date in the local time zone
    pub fn on_date(&self, date: NaiveDate) -> Vec<Message> {
        let all = self.messages.all();
        views::messages_on_local_date(&all, date)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Messages on the date selected in the session
    pub fn selected_date_messages(&self) -> Vec<Message> {
        match self.session().selected_date {
            Some(date) => self.on_date(date),
            None => Vec::new(),
        }
    }

    pub fn pinned(&self) -> Vec<Message> {
        let pinned = self.session().pinned.clone();
        let all = self.messages.all();
        views::pinned_messages(&all, &pinned)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Distinct senders with message counts, busiest first
    pub fn senders(&self) -> Vec<(String, usize)> {
        views::sender_counts(&self.messages.all())
    }

    pub fn groups(&self) -> Vec<String> {
        views::group_names(&self.messages.all())
    }

    pub fn users(&self) -> Vec<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn jobcards(&self) -> Vec<Jobcard> {
        self.jobcards.all()
    }

    // === Session ===

    /// Lock the session state
    pub fn session(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.session)
    }

    /// Current error banner, if any
    pub fn banner(&self) -> Option<String> {
        self.session().banner.clone()
    }

    /// Notifications that have not expired yet
    pub fn notifications(&self) -> Vec<String> {
        self.session()
            .notifications
            .active()
            .into_iter()
            .map(String::from)
            .collect()
    }

    // === Export ===

    /// Export every loaded message to a PDF file
    pub fn export_pdf(&self, path: &Path) -> Result<usize> {
        let result = crate::export::export_pdf(&self.messages.all(), path);
        self.surface("Export", result)
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
