//! Command-line interface definition

use clap::{Args, Parser, Subcommand};
use dashboard::{Jobcard, JobcardPatch, JobcardStatus};
use std::path::PathBuf;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "dashctl",
    version,
    about = "Terminal front end for the Telegram & WhatsApp message dashboard"
)]
pub struct Cli {
    /// Settings file (defaults to ~/.config/chatdesk/dashboard.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend API base URL, overriding the settings file
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List messages, newest first
    Messages {
        /// Case-insensitive filter on sender, content, group or platform
        #[arg(long, short)]
        filter: Option<String>,

        /// Pin a message id before listing (repeatable)
        #[arg(long = "pin", value_name = "ID")]
        pin: Vec<String>,

        /// Hide a message id for this session before listing (repeatable)
        #[arg(long = "delete", value_name = "ID")]
        delete: Vec<String>,

        /// Only list pinned messages
        #[arg(long, default_value_t = false)]
        pinned: bool,
    },
    /// Load the snapshot and print new messages as they arrive (Ctrl-C to stop)
    Watch {
        #[arg(long, short)]
        filter: Option<String>,
    },
    /// Show a sender's profile
    Profile { sender: String },
    /// List messages sent on a date (YYYY-MM-DD, local time)
    On { date: String },
    /// List senders with message counts
    Senders,
    /// Advanced search, e.g. `platform:whatsapp from:alice after:2024-05-01 kudu`
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Ask the AI search a question
    Ask {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Export all messages to a PDF file
    Export { path: PathBuf },
    /// Download the image of an image message
    Image { file_id: String, out: PathBuf },
    /// List users
    Users,
    /// List jobcards
    Jobcards {
        /// Extract new jobcards from messages with AI first
        #[arg(long, default_value_t = false)]
        ai: bool,
    },
    /// Change a jobcard
    #[command(subcommand)]
    Jobcard(JobcardCommand),
}

#[derive(Subcommand, Debug)]
pub enum JobcardCommand {
    /// Create a jobcard by hand
    Create {
        #[command(flatten)]
        fields: JobcardFields,
    },
    /// Set status: open, in-progress or done
    Status {
        id: String,
        #[arg(value_parser = parse_status)]
        status: JobcardStatus,
    },
    /// Edit jobcard fields
    Edit {
        id: String,
        #[command(flatten)]
        fields: JobcardFields,
    },
    /// Assign to a user id
    Assign { id: String, user_id: String },
    /// Add a comment
    Comment {
        id: String,
        text: String,
        /// Commenting user id
        #[arg(long)]
        user: Option<String>,
    },
    /// Delete a jobcard
    Delete { id: String },
}

#[derive(Args, Debug, Default)]
pub struct JobcardFields {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub who: Option<String>,
    #[arg(long)]
    pub what: Option<String>,
    #[arg(long = "where")]
    pub location: Option<String>,
    #[arg(long)]
    pub when: Option<String>,
    #[arg(long)]
    pub trophy: Option<String>,
    #[arg(long)]
    pub contact: Option<String>,
    #[arg(long)]
    pub instructions: Option<String>,
}

impl JobcardFields {
    pub fn into_patch(self) -> JobcardPatch {
        JobcardPatch {
            title: self.title,
            description: self.description,
            who: self.who,
            what: self.what,
            location: self.location,
            when: self.when,
            trophy_details: self.trophy,
            contact_info: self.contact,
            special_instructions: self.instructions,
        }
    }

    pub fn into_jobcard(self) -> Jobcard {
        Jobcard {
            title: self.title,
            description: self.description,
            who: self.who,
            what: self.what,
            location: self.location,
            when: self.when,
            trophy_details: self.trophy,
            contact_info: self.contact,
            special_instructions: self.instructions,
            ..Default::default()
        }
    }
}

fn parse_status(s: &str) -> Result<JobcardStatus, String> {
    JobcardStatus::parse(s).ok_or_else(|| format!("unknown status {:?}", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_jobcard_status() {
        let cli = Cli::parse_from(["dashctl", "jobcard", "status", "j1", "in-progress"]);
        match cli.command {
            Command::Jobcard(JobcardCommand::Status { id, status }) => {
                assert_eq!(id, "j1");
                assert_eq!(status, JobcardStatus::InProgress);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_messages_local_commands() {
        let cli = Cli::parse_from([
            "dashctl", "messages", "--pin", "m1", "--delete", "m2", "--delete", "m3",
        ]);
        let Command::Messages { pin, delete, .. } = cli.command else {
            panic!("expected messages");
        };
        assert_eq!(pin, vec!["m1"]);
        assert_eq!(delete, vec!["m2", "m3"]);
    }

    #[test]
    fn test_global_api_url() {
        let cli = Cli::parse_from(["dashctl", "senders", "--api-url", "http://backend/api"]);
        assert_eq!(cli.api_url.as_deref(), Some("http://backend/api"));
    }

    #[test]
    fn test_fields_into_patch() {
        let cli = Cli::parse_from(["dashctl", "jobcard", "edit", "j1", "--where", "Camp 3"]);
        let Command::Jobcard(JobcardCommand::Edit { fields, .. }) = cli.command else {
            panic!("expected edit");
        };
        let patch = fields.into_patch();
        assert_eq!(patch.location.as_deref(), Some("Camp 3"));
        assert!(patch.title.is_none());
    }
}
