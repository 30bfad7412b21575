//! Plain-text rendering of dashboard data

use chrono::{DateTime, Local, Utc};
use dashboard::{Jobcard, Message, SenderProfile, User};
use std::fmt::Write;

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// One line per message: time, badge, sender, text, id
pub fn message_line(message: &Message, pinned: bool) -> String {
    let mut line = format!(
        "{}{} [{}] {}: {}",
        if pinned { "* " } else { "" },
        local_time(message.timestamp),
        message.badge(),
        message.sender,
        message.display_text().replace('\n', " ")
    );
    if let Some(path) = message.image_path() {
        let _ = write!(line, " <{}>", path);
    }
    let _ = write!(line, "  ({})", message.id);
    line
}

pub fn profile(profile: &SenderProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", profile.sender);
    let _ = writeln!(out, "  Messages:   {}", profile.message_count);
    if let Some(first) = profile.first_seen {
        let _ = writeln!(out, "  First seen: {}", local_time(first));
    }
    if let Some(last) = profile.last_seen {
        let _ = writeln!(out, "  Last seen:  {}", local_time(last));
    }
    let platforms: Vec<&str> = profile.platforms.iter().map(|p| p.label()).collect();
    let _ = writeln!(out, "  Platforms:  {}", platforms.join(", "));
    if !profile.recent.is_empty() {
        let _ = writeln!(out, "  Recent:");
        for message in &profile.recent {
            let _ = writeln!(out, "    {}", message_line(message, false));
        }
    }
    out
}

/// Multi-line jobcard, with missing extraction fields called out
pub fn jobcard(card: &Jobcard, users: &[User]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} [{}] {}",
        card.id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
        card.status,
        card.title.as_deref().unwrap_or("(untitled)")
    );
    if let Some(description) = &card.description {
        let _ = writeln!(out, "  {}", description);
    }
    for (label, value) in card.fields() {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(value) => {
                let _ = writeln!(out, "  {}: {}", label, value);
            }
            None => {
                let _ = writeln!(out, "  {}: (missing)", label);
            }
        }
    }
    if let Some(assignee) = &card.assigned_to {
        let _ = writeln!(out, "  Assigned to: {}", assignee.label(users));
    }
    for comment in &card.comments {
        let who = comment
            .user
            .as_ref()
            .map(|u| u.label(users))
            .unwrap_or("anonymous");
        let _ = writeln!(
            out,
            "  - {} {}: {}",
            local_time(comment.timestamp),
            who,
            comment.text
        );
    }
    out
}

pub fn user_line(user: &User) -> String {
    format!(
        "{}  {}{}",
        user.id,
        user.label(),
        user.role
            .as_deref()
            .map(|r| format!(" ({})", r))
            .unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard::{JobcardId, UserRef};

    #[test]
    fn test_message_line_marks_pinned() {
        let message = Message::builder("m1", "alice").content("hello\nthere").build();
        let line = message_line(&message, true);
        assert!(line.starts_with("* "));
        assert!(line.contains("[Telegram] alice: hello there"));
        assert!(line.ends_with("(m1)"));
    }

    #[test]
    fn test_jobcard_flags_missing_fields() {
        let card = Jobcard {
            id: Some(JobcardId::new("j1")),
            title: Some("Kudu pickup".to_string()),
            who: Some("Piet".to_string()),
            assigned_to: Some(UserRef::Id("u1".to_string())),
            ..Default::default()
        };
        let users = vec![User::new("u1", "piet").with_display_name("Piet Botha")];

        let text = jobcard(&card, &users);
        assert!(text.starts_with("j1 [open] Kudu pickup"));
        assert!(text.contains("Who: Piet"));
        assert!(text.contains("Where: (missing)"));
        assert!(text.contains("Assigned to: Piet Botha"));
    }
}
