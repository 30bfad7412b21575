//! In-memory stores owned by the dashboard session
//!
//! Both stores are guarded by `RwLock`s so the live update thread and the
//! caller can share them; every mutation goes through the store's methods.

mod jobcards;
mod messages;

pub use jobcards::JobcardStore;
pub use messages::{MergeOutcome, MessageStore};
