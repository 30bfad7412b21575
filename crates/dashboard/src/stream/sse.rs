//! Server-sent events framing

use anyhow::{Context, Result};
use std::time::Duration;

use crate::models::Message;

/// One dispatched event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SseEvent {
    /// Event type, `message` when the server sent none
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// Incremental line-oriented SSE parser
///
/// Feed it one line at a time (without the trailing newline); a blank line
/// dispatches the accumulated event.
#[derive(Debug, Default)]
pub struct SseParser {
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
    retry: Option<Duration>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one line, returning an event when the line completes one
    pub fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.last_id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.trim().parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
        None
    }

    /// Take the reconnection delay announced by the server, if any
    pub fn take_retry(&mut self) -> Option<Duration> {
        self.retry.take()
    }

    /// Last event id seen on this stream
    pub fn last_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
            id: self.last_id.clone(),
        })
    }
}

/// Decode an event payload into a batch of messages
///
/// The payload is normally a JSON array; a single object is a batch of one.
pub fn decode_batch(data: &str) -> Result<Vec<Message>> {
    let value: serde_json::Value =
        serde_json::from_str(data).context("Event data is not valid JSON")?;

    if value.is_array() {
        serde_json::from_value(value).context("Failed to decode message batch")
    } else {
        let message: Message =
            serde_json::from_value(value).context("Failed to decode message")?;
        Ok(vec![message])
    }
}
