//! Advanced search filter and its operator query syntax
//!
//! Parses search queries with operators like:
//! - `platform:whatsapp` - platform filter
//! - `from:alice` or `sender:"Alice Smith"` - sender filter
//! - `group:"Kudu Hunters"` - WhatsApp group filter
//! - `type:image` - message type filter
//! - `after:2024/05/01`, `before:2024-05-31` - date range
//!
//! Everything else becomes the keyword string.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{MessageType, Platform};

/// Structured filter submitted to the backend search endpoint
///
/// Unset fields are omitted from the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
}

impl SearchFilter {
    /// Check if the filter is empty (no keywords or field filters)
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse an operator query string into a search filter
///
/// Unknown operators and unparseable values are kept as keywords so nothing
/// the operator typed is silently dropped. Repeated operators keep the last
/// value.
pub fn parse_query(input: &str) -> SearchFilter {
    let mut filter = SearchFilter::default();
    let mut keywords: Vec<String> = Vec::new();

    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }

        let rest: String = chars[i..].iter().collect();

        if let Some((key, value, consumed)) = parse_operator(&rest) {
            let applied = match key.to_lowercase().as_str() {
                "platform" | "on" => Platform::parse(&value).map(|p| filter.platform = Some(p)),
                "from" | "sender" => {
                    filter.sender = Some(value);
                    Some(())
                }
                "group" => {
                    filter.group = Some(value);
                    Some(())
                }
                "type" => MessageType::parse(&value).map(|t| filter.message_type = Some(t)),
                "after" => parse_date(&value).map(|d| filter.date_from = Some(d)),
                "before" => parse_date(&value).map(|d| filter.date_to = Some(d)),
                _ => None,
            };
            if applied.is_none() {
                keywords.push(rest.chars().take(consumed).collect());
            }
            i += consumed;
        } else {
            let (word, consumed) = parse_value(&rest);
            if !word.is_empty() {
                keywords.push(word);
            }
            i += consumed;
        }
    }

    if !keywords.is_empty() {
        filter.keywords = Some(keywords.join(" "));
    }
    filter
}

/// Parse an operator like "from:value" or "group:\"quoted value\""
fn parse_operator(input: &str) -> Option<(String, String, usize)> {
    let colon_pos = input.find(':')?;
    let key = &input[..colon_pos];

    let valid_ops = ["platform", "on", "from", "sender", "group", "type", "after", "before"];
    if !valid_ops.contains(&key.to_lowercase().as_str()) {
        return None;
    }

    let after_colon = &input[colon_pos + 1..];
    let (value, value_len) = parse_value(after_colon);

    if value.is_empty() {
        return None;
    }

    Some((key.to_string(), value, key.chars().count() + 1 + value_len))
}

/// Parse a value or word (quoted or unquoted); returns chars consumed
fn parse_value(input: &str) -> (String, usize) {
    let chars: Vec<char> = input.chars().collect();

    if chars.is_empty() {
        return (String::new(), 0);
    }

    if chars[0] == '"' {
        let mut value = String::new();
        let mut i = 1;
        while i < chars.len() && chars[i] != '"' {
            value.push(chars[i]);
            i += 1;
        }
        let consumed = if i < chars.len() { i + 1 } else { i };
        return (value, consumed);
    }

    let mut value = String::new();
    let mut i = 0;
    while i < chars.len() && !chars[i].is_whitespace() {
        value.push(chars[i]);
        i += 1;
    }

    (value, i)
}

/// Parse a date string (YYYY/MM/DD or YYYY-MM-DD)
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%Y-%m-%d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_keywords_only() {
        let filter = parse_query("kudu trophy");
        assert_eq!(filter.keywords.as_deref(), Some("kudu trophy"));
        assert!(filter.sender.is_none());
    }

    #[test]
    fn test_parse_all_operators() {
        let filter = parse_query(
            "platform:whatsapp from:alice group:\"Kudu Hunters\" type:image after:2024/05/01 before:2024-05-31 pickup",
        );
        assert_eq!(filter.platform, Some(Platform::Whatsapp));
        assert_eq!(filter.sender.as_deref(), Some("alice"));
        assert_eq!(filter.group.as_deref(), Some("Kudu Hunters"));
        assert_eq!(filter.message_type, Some(MessageType::Image));
        assert_eq!(filter.date_from, Some(date(2024, 5, 1)));
        assert_eq!(filter.date_to, Some(date(2024, 5, 31)));
        assert_eq!(filter.keywords.as_deref(), Some("pickup"));
    }

    #[test]
    fn test_quoted_sender() {
        let filter = parse_query("sender:\"Piet van Wyk\"");
        assert_eq!(filter.sender.as_deref(), Some("Piet van Wyk"));
        assert!(filter.keywords.is_none());
    }

    #[test]
    fn test_unknown_operator_is_keyword() {
        let filter = parse_query("foo:bar");
        assert_eq!(filter.keywords.as_deref(), Some("foo:bar"));
    }

    #[test]
    fn test_invalid_operator_value_is_keyword() {
        let filter = parse_query("platform:signal after:yesterday");
        assert!(filter.platform.is_none());
        assert!(filter.date_from.is_none());
        assert_eq!(filter.keywords.as_deref(), Some("platform:signal after:yesterday"));
    }

    #[test]
    fn test_operator_with_empty_value() {
        let filter = parse_query("from: hello");
        assert!(filter.sender.is_none());
        assert_eq!(filter.keywords.as_deref(), Some("from: hello"));
    }

    #[test]
    fn test_empty_query() {
        assert!(parse_query("").is_empty());
        assert!(parse_query("   ").is_empty());
    }

    #[test]
    fn test_request_body_omits_unset_fields() {
        let filter = parse_query("platform:telegram after:2024-05-01");
        let body = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"platform": "telegram", "dateFrom": "2024-05-01"})
        );
    }
}
