//! Slash commands for interactive mode

mod export;
mod transcript;

pub use export::ExportCommand;
pub use transcript::{SearchCommand, SummaryCommand};

use std::path::PathBuf;

use musache_session::Conversation;

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Upload a document from this path
    Upload(PathBuf),
    /// Show the server's ingestion status
    Status,
    /// Run a health check
    Health,
    /// Show server-side history, up to this many entries
    History(u32),
    /// Show server diagnostics
    Debug,
    /// Clear the conversation
    Clear,
    /// Show a message to the user (not sent as a question)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(
    input: &str,
    conversation: &Conversation,
    history_limit: u32,
) -> Option<CommandResult> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let parts: Vec<&str> = input[1..].splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "upload" | "u" => {
            if args.is_empty() {
                CommandResult::Message("Usage: /upload <path to .pdf or .txt>".to_string())
            } else {
                CommandResult::Upload(PathBuf::from(args))
            }
        }

        "status" => CommandResult::Status,

        "health" => CommandResult::Health,

        "history" => match parse_limit(args, history_limit) {
            Some(limit) => CommandResult::History(limit),
            None => CommandResult::Message(format!("Invalid history limit: '{}'", args)),
        },

        "export" | "e" => ExportCommand::execute(args, conversation),

        "summary" | "s" => SummaryCommand::execute(conversation),

        "search" | "find" => SearchCommand::execute(args, conversation),

        "debug" => CommandResult::Debug,

        "clear" | "c" => CommandResult::Clear,

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn parse_limit(args: &str, default: u32) -> Option<u32> {
    if args.is_empty() {
        return Some(default);
    }
    args.parse().ok().filter(|n| *n > 0)
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?         Show this help message
  /upload, /u <path>    Upload a .pdf or .txt document (max 10 MB)
  /status               Show whether the document is ready
  /health               Check that the server is reachable
  /history [n]          Show the last n questions stored on the server
  /export, /e [dir]     Save this conversation as JSON
  /summary, /s          Show conversation statistics
  /search, /find <text> Find earlier questions and answers
  /debug                Show server diagnostics
  /clear, /c            Clear conversation history
  /quit, /exit, /q      Exit musache

Anything else is sent as a question about the uploaded document."#
        .to_string()
}
