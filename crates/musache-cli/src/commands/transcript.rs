//! /summary and /search - views over the local transcript

use musache_session::{Conversation, ConversationSummary};

use super::CommandResult;
use crate::utils::{one_line, truncate_chars};

pub struct SummaryCommand;

impl SummaryCommand {
    pub fn execute(conversation: &Conversation) -> CommandResult {
        CommandResult::Message(format_summary(&conversation.summary()))
    }
}

pub struct SearchCommand;

impl SearchCommand {
    pub fn execute(args: &str, conversation: &Conversation) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message("Usage: /search <text>".to_string());
        }

        let hits = conversation.search(args);
        if hits.is_empty() {
            return CommandResult::Message(format!("No turns mention '{}'.", args));
        }

        let mut output = format!("{} matching turn(s):\n", hits.len());
        for turn in hits {
            output.push_str(&format!(
                "\n  #{} Q: {}\n     A: {}",
                turn.id + 1,
                truncate_chars(&one_line(&turn.question), 80),
                truncate_chars(&one_line(&turn.answer), 120)
            ));
        }
        CommandResult::Message(output)
    }
}

fn format_summary(summary: &ConversationSummary) -> String {
    if summary.total_questions == 0 {
        return "No questions asked yet.".to_string();
    }

    let mut output = format!("Questions asked: {}", summary.total_questions);
    if let Some(avg) = summary.average_response_time_seconds {
        output.push_str(&format!("\nAverage response time: {:.2}s", avg));
    }
    if let (Some(first), Some(last)) = (summary.first_turn_at, summary.last_turn_at) {
        output.push_str(&format!(
            "\nFirst question: {}\nLast question: {}",
            first.format("%Y-%m-%d %H:%M:%S UTC"),
            last.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    output
}
