//! Domain models for dashboard entities

mod jobcard;
mod message;
mod user;

pub use jobcard::{Comment, Jobcard, JobcardId, JobcardPatch, JobcardStatus};
pub use message::{Message, MessageBuilder, MessageId, MessageType, Platform};
pub use user::{User, UserRef};
