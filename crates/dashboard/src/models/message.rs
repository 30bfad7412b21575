//! Message model representing one ingested chat message

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a message (backend-assigned `_id`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Messaging platform a message was ingested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
    Whatsapp,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Telegram => "telegram",
            Platform::Whatsapp => "whatsapp",
        }
    }

    /// Human-readable badge text
    pub fn label(&self) -> &'static str {
        match self {
            Platform::Telegram => "Telegram",
            Platform::Whatsapp => "WhatsApp",
        }
    }

    /// Parse a platform name, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "telegram" | "tg" => Some(Platform::Telegram),
            "whatsapp" | "wa" => Some(Platform::Whatsapp),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Some(MessageType::Text),
            "image" => Some(MessageType::Image),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat message from Telegram or WhatsApp
///
/// Field names follow the backend's JSON representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Backend-assigned identifier, immutable once created
    #[serde(rename = "_id")]
    pub id: MessageId,
    /// Display name or handle of the sender
    pub sender: String,
    /// When the message was sent
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub message_type: MessageType,
    /// Text body (text messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Caption (image messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub platform: Platform,
    /// WhatsApp group name, only for WhatsApp messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_group: Option<String>,
    #[serde(rename = "file_id", default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(rename = "file_unique_id", default, skip_serializing_if = "Option::is_none")]
    pub file_unique_id: Option<String>,
    #[serde(rename = "file_type", default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

impl Message {
    /// Create a new message builder
    pub fn builder(id: impl Into<MessageId>, sender: impl Into<String>) -> MessageBuilder {
        MessageBuilder::new(id.into(), sender.into())
    }

    /// Text shown for this message in lists: content, then caption, then a placeholder
    pub fn display_text(&self) -> &str {
        self.content
            .as_deref()
            .filter(|c| !c.is_empty())
            .or(self.caption.as_deref().filter(|c| !c.is_empty()))
            .unwrap_or("[Image]")
    }

    /// Backend path of the image payload, if this is an image message
    pub fn image_path(&self) -> Option<String> {
        match (self.message_type, &self.file_id) {
            (MessageType::Image, Some(file_id)) => {
                Some(format!("/image/{}", urlencoding::encode(file_id)))
            }
            _ => None,
        }
    }

    /// Platform badge, including the group for WhatsApp messages
    pub fn badge(&self) -> String {
        match (&self.platform, &self.whatsapp_group) {
            (Platform::Whatsapp, Some(group)) => format!("{}: {}", self.platform.label(), group),
            _ => self.platform.label().to_string(),
        }
    }
}

/// Builder for creating Message instances
pub struct MessageBuilder {
    id: MessageId,
    sender: String,
    timestamp: Option<DateTime<Utc>>,
    message_type: MessageType,
    content: Option<String>,
    caption: Option<String>,
    platform: Platform,
    whatsapp_group: Option<String>,
    file_id: Option<String>,
    file_unique_id: Option<String>,
    file_type: Option<String>,
}

impl MessageBuilder {
    fn new(id: MessageId, sender: String) -> Self {
        Self {
            id,
            sender,
            timestamp: None,
            message_type: MessageType::Text,
            content: None,
            caption: None,
            platform: Platform::Telegram,
            whatsapp_group: None,
            file_id: None,
            file_unique_id: None,
            file_type: None,
        }
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Mark as a WhatsApp message posted in the given group
    pub fn whatsapp_group(mut self, group: impl Into<String>) -> Self {
        self.platform = Platform::Whatsapp;
        self.whatsapp_group = Some(group.into());
        self
    }

    /// Mark as an image message referencing the given file
    pub fn image(mut self, file_id: impl Into<String>, file_type: impl Into<String>) -> Self {
        let file_id = file_id.into();
        self.message_type = MessageType::Image;
        self.file_unique_id = Some(format!("u-{}", file_id));
        self.file_id = Some(file_id);
        self.file_type = Some(file_type.into());
        self
    }

    pub fn build(self) -> Message {
        Message {
            id: self.id,
            sender: self.sender,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            message_type: self.message_type,
            content: self.content,
            caption: self.caption,
            platform: self.platform,
            whatsapp_group: self.whatsapp_group,
            file_id: self.file_id,
            file_unique_id: self.file_unique_id,
            file_type: self.file_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_backend_message() {
        let json = r#"{
            "_id": "665f1c",
            "sender": "alice",
            "timestamp": "2024-05-01T09:30:00.000Z",
            "messageType": "image",
            "caption": "trophy",
            "platform": "whatsapp",
            "whatsappGroup": "Hunters",
            "file_id": "AgAD",
            "file_unique_id": "AQAD",
            "file_type": "photo",
            "__v": 0
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id.as_str(), "665f1c");
        assert_eq!(msg.message_type, MessageType::Image);
        assert_eq!(msg.platform, Platform::Whatsapp);
        assert_eq!(msg.whatsapp_group.as_deref(), Some("Hunters"));
        assert_eq!(msg.file_id.as_deref(), Some("AgAD"));
        assert_eq!(msg.timestamp.to_rfc3339(), "2024-05-01T09:30:00+00:00");
    }

    #[test]
    fn test_message_type_defaults_to_text() {
        let json = r#"{"_id":"1","sender":"bob","timestamp":"2024-05-01T00:00:00Z","platform":"telegram","content":"hi"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.message_type, MessageType::Text);
        assert!(msg.whatsapp_group.is_none());
    }

    #[test]
    fn test_unknown_platform_rejected() {
        let json = r#"{"_id":"1","sender":"bob","timestamp":"2024-05-01T00:00:00Z","platform":"signal"}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn test_display_text_fallbacks() {
        let text = Message::builder("1", "a").content("hello").build();
        assert_eq!(text.display_text(), "hello");

        let captioned = Message::builder("2", "a").image("f1", "photo").caption("look").build();
        assert_eq!(captioned.display_text(), "look");

        let bare = Message::builder("3", "a").image("f2", "photo").build();
        assert_eq!(bare.display_text(), "[Image]");
    }

    #[test]
    fn test_image_path_encodes_file_id() {
        let msg = Message::builder("1", "a").image("a/b c", "photo").build();
        assert_eq!(msg.image_path().as_deref(), Some("/image/a%2Fb%20c"));

        let text = Message::builder("2", "a").content("x").build();
        assert!(text.image_path().is_none());
    }

    #[test]
    fn test_badge() {
        let wa = Message::builder("1", "a").whatsapp_group("Hunters").build();
        assert_eq!(wa.badge(), "WhatsApp: Hunters");

        let tg = Message::builder("2", "a").build();
        assert_eq!(tg.badge(), "Telegram");
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!(Platform::parse("WhatsApp"), Some(Platform::Whatsapp));
        assert_eq!(Platform::parse(" telegram "), Some(Platform::Telegram));
        assert_eq!(Platform::parse("sms"), None);
    }
}
