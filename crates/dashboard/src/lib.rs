//! Dashboard crate - Business logic for the chat message dashboard
//!
//! This crate provides platform-independent dashboard functionality including:
//! - Domain models (Message, Jobcard, User)
//! - Backend HTTP client behind the `Backend` trait
//! - Live update channel over server-sent events, with reconnect
//! - The reconciling message store and the jobcard collection
//! - Derived views (text filter, sender profile, date bucket, pinned)
//! - Command handlers (delete, pin, search, AI, jobcards)
//! - PDF export
//!
//! This crate has zero UI dependencies; `Dashboard` is the entry point for
//! front ends.

pub mod actions;
pub mod api;
pub mod config;
pub mod export;
pub mod models;
pub mod search;
pub mod service;
pub mod session;
pub mod store;
pub mod stream;
pub mod views;

pub use actions::ActionHandler;
pub use api::{AiAnswer, AiJobcards, Backend, BackendClient, StatusError};
pub use config::{DashboardConfig, ReconnectConfig};
pub use models::{
    Comment, Jobcard, JobcardId, JobcardPatch, JobcardStatus, Message, MessageId, MessageType,
    Platform, User, UserRef,
};
pub use search::{SearchFilter, parse_query};
pub use service::{Dashboard, LiveUpdate, LoadSummary};
pub use session::{Notifications, PinnedSet, SessionState};
pub use store::{JobcardStore, MergeOutcome, MessageStore};
pub use stream::{ChannelEvent, EventStream, ReconnectPolicy, Subscription};
pub use views::SenderProfile;
