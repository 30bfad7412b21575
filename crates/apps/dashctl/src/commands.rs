//! One-shot command execution
//!
//! Everything here blocks on HTTP; `main` runs it on tokio's blocking pool.

use anyhow::{Context, Result, bail};
use dashboard::search::parse_date;
use dashboard::{AiAnswer, AiJobcards, Dashboard, JobcardId, MessageId, parse_query};
use std::path::Path;

use crate::cli::{Command, JobcardCommand};
use crate::render;

pub fn execute(dashboard: &Dashboard, command: Command) -> Result<()> {
    match command {
        Command::Messages {
            filter,
            pin,
            delete,
            pinned,
        } => list_messages(dashboard, filter, pin, delete, pinned),
        Command::Watch { .. } => bail!("watch is handled by the async front end"),
        Command::Profile { sender } => {
            dashboard.load_snapshot()?;
            let profile = dashboard.profile(&sender);
            if profile.message_count == 0 {
                println!("No messages from {}", sender);
            } else {
                print!("{}", render::profile(&profile));
            }
            Ok(())
        }
        Command::On { date } => {
            let date = parse_date(&date).with_context(|| format!("Invalid date: {}", date))?;
            dashboard.load_snapshot()?;
            dashboard.session().select_date(Some(date));
            print_messages(dashboard, &dashboard.selected_date_messages());
            Ok(())
        }
        Command::Senders => {
            dashboard.load_snapshot()?;
            for (sender, count) in dashboard.senders() {
                println!("{:>6}  {}", count, sender);
            }
            Ok(())
        }
        Command::Search { query } => {
            let filter = parse_query(&query.join(" "));
            let count = dashboard.actions().advanced_search(&filter)?;
            println!("{} matching messages", count);
            print_messages(dashboard, &dashboard.messages());
            Ok(())
        }
        Command::Ask { query } => {
            let answer = dashboard.actions().ai_query(&query.join(" "))?;
            match answer {
                AiAnswer::Result(text) => println!("{}", text),
                AiAnswer::Error(_) => eprintln!("{}", answer.display()),
            }
            Ok(())
        }
        Command::Export { path } => {
            dashboard.load_snapshot()?;
            let count = dashboard.export_pdf(&path)?;
            println!("Exported {} messages to {}", count, path.display());
            Ok(())
        }
        Command::Image { file_id, out } => save_image(dashboard, &file_id, &out),
        Command::Users => {
            dashboard.load_users()?;
            for user in dashboard.users() {
                println!("{}", render::user_line(&user));
            }
            Ok(())
        }
        Command::Jobcards { ai } => list_jobcards(dashboard, ai),
        Command::Jobcard(command) => jobcard(dashboard, command),
    }
}

fn list_messages(
    dashboard: &Dashboard,
    filter: Option<String>,
    pin: Vec<String>,
    delete: Vec<String>,
    pinned_only: bool,
) -> Result<()> {
    dashboard.load_snapshot()?;
    for id in delete {
        dashboard.actions().delete_message(&MessageId::new(id));
    }
    for id in pin {
        dashboard.actions().toggle_pin(&MessageId::new(id));
    }
    for notice in dashboard.notifications() {
        eprintln!("{}", notice);
    }
    if let Some(filter) = filter {
        dashboard.session().set_filter(filter);
    }

    let messages = if pinned_only {
        dashboard.pinned()
    } else {
        dashboard.filtered()
    };
    print_messages(dashboard, &messages);
    Ok(())
}

pub fn print_messages(dashboard: &Dashboard, messages: &[dashboard::Message]) {
    if messages.is_empty() {
        println!("No messages");
        return;
    }
    let pinned = dashboard.session().pinned.clone();
    for message in messages {
        println!("{}", render::message_line(message, pinned.contains(&message.id)));
    }
}

fn save_image(dashboard: &Dashboard, file_id: &str, out: &Path) -> Result<()> {
    let bytes = dashboard.actions().fetch_image(file_id)?;
    std::fs::write(out, &bytes)
        .with_context(|| format!("Failed to write image: {}", out.display()))?;
    println!("Saved {} bytes to {}", bytes.len(), out.display());
    Ok(())
}

fn list_jobcards(dashboard: &Dashboard, ai: bool) -> Result<()> {
    // users only resolve assignee names; listing works without them
    let _ = dashboard.load_users();
    dashboard.load_jobcards()?;

    if ai {
        match dashboard.actions().load_ai_jobcards()? {
            AiJobcards::Extracted(cards) => println!("AI extracted {} jobcards", cards.len()),
            AiJobcards::Raw(_) | AiJobcards::Empty => {
                if let Some(err) = dashboard.session().ai_error.clone() {
                    eprintln!("{}", err);
                }
            }
        }
    }

    let users = dashboard.users();
    let jobcards = dashboard.jobcards();
    if jobcards.is_empty() {
        println!("No jobcards");
    }
    for card in &jobcards {
        println!("{}", render::jobcard(card, &users));
    }
    Ok(())
}

fn jobcard(dashboard: &Dashboard, command: JobcardCommand) -> Result<()> {
    let actions = dashboard.actions();
    let card = match command {
        JobcardCommand::Create { fields } => actions.create_jobcard(&fields.into_jobcard())?,
        JobcardCommand::Status { id, status } => {
            actions.set_jobcard_status(&JobcardId::new(id), status)?
        }
        JobcardCommand::Edit { id, fields } => {
            actions.edit_jobcard(&JobcardId::new(id), &fields.into_patch())?
        }
        JobcardCommand::Assign { id, user_id } => {
            actions.assign_jobcard(&JobcardId::new(id), &user_id)?
        }
        JobcardCommand::Comment { id, text, user } => {
            actions.comment_jobcard(&JobcardId::new(id), user.as_deref(), &text)?
        }
        JobcardCommand::Delete { id } => {
            actions.delete_jobcard(&JobcardId::new(id.as_str()))?;
            println!("Deleted jobcard {}", id);
            return Ok(());
        }
    };

    let _ = dashboard.load_users();
    print!("{}", render::jobcard(&card, &dashboard.users()));
    Ok(())
}
