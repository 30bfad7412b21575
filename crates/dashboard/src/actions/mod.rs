//! Operator commands
//!
//! Provides the handler for message, search, AI and jobcard commands.

mod handler;

pub use handler::{ActionHandler, notices};
