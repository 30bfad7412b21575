//! Message projections

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use std::collections::{BTreeSet, HashMap};

use crate::models::{Message, Platform};
use crate::session::PinnedSet;

/// Aggregated activity of one sender
#[derive(Debug, Clone, PartialEq)]
pub struct SenderProfile {
    pub sender: String,
    /// Number of messages from this sender
    pub message_count: usize,
    /// Timestamp of the oldest message
    pub first_seen: Option<DateTime<Utc>>,
    /// Timestamp of the newest message
    pub last_seen: Option<DateTime<Utc>>,
    /// Distinct platforms, in the order they are first encountered
    pub platforms: Vec<Platform>,
    /// Most recent messages, newest first
    pub recent: Vec<Message>,
}

/// Case-insensitive substring filter over sender, content, group and platform
///
/// An empty query passes everything through in order.
pub fn filter_messages<'a>(messages: &'a [Message], query: &str) -> Vec<&'a Message> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return messages.iter().collect();
    }

    messages
        .iter()
        .filter(|m| matches_filter(m, &needle))
        .collect()
}

fn matches_filter(message: &Message, needle: &str) -> bool {
    let contains = |s: &str| s.to_lowercase().contains(needle);
    contains(&message.sender)
        || message.content.as_deref().is_some_and(contains)
        || message.whatsapp_group.as_deref().is_some_and(contains)
        || contains(message.platform.as_str())
}

/// Build the profile of a sender from the current collection
///
/// `messages` is expected newest first, so `recent` is just the leading slice
/// of that sender's messages.
pub fn sender_profile(messages: &[Message], sender: &str, recent_limit: usize) -> SenderProfile {
    let own: Vec<&Message> = messages.iter().filter(|m| m.sender == sender).collect();

    let mut platforms = Vec::new();
    for m in &own {
        if !platforms.contains(&m.platform) {
            platforms.push(m.platform);
        }
    }

    SenderProfile {
        sender: sender.to_string(),
        message_count: own.len(),
        first_seen: own.iter().map(|m| m.timestamp).min(),
        last_seen: own.iter().map(|m| m.timestamp).max(),
        platforms,
        recent: own.into_iter().take(recent_limit).cloned().collect(),
    }
}

/// Messages whose timestamp falls on `date` as seen in time zone `tz`
pub fn messages_on_date<'a, Tz: TimeZone>(
    messages: &'a [Message],
    date: NaiveDate,
    tz: &Tz,
) -> Vec<&'a Message> {
    messages
        .iter()
        .filter(|m| m.timestamp.with_timezone(tz).date_naive() == date)
        .collect()
}

/// Messages on `date` in the machine's local time zone
pub fn messages_on_local_date(messages: &[Message], date: NaiveDate) -> Vec<&Message> {
    messages_on_date(messages, date, &Local)
}

/// Pinned messages in collection order
pub fn pinned_messages<'a>(messages: &'a [Message], pinned: &PinnedSet) -> Vec<&'a Message> {
    if pinned.is_empty() {
        return Vec::new();
    }
    messages.iter().filter(|m| pinned.contains(&m.id)).collect()
}

/// Distinct senders with message counts, busiest first
pub fn sender_counts(messages: &[Message]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for m in messages {
        *counts.entry(m.sender.as_str()).or_default() += 1;
    }

    let mut result: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(sender, count)| (sender.to_string(), count))
        .collect();
    result.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    result
}

/// Distinct WhatsApp group names, sorted
pub fn group_names(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| m.whatsapp_group.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
