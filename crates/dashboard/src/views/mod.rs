//! Derived views for UI consumption
//!
//! Pure projections over the message store. Nothing here mutates state;
//! every view is recomputed from the current collection on each read.

mod messages;

pub use messages::{
    SenderProfile, filter_messages, group_names, messages_on_date, messages_on_local_date,
    pinned_messages, sender_counts, sender_profile,
};
