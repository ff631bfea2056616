//! /export command - save the transcript as JSON

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use musache_session::Conversation;

use super::CommandResult;

pub struct ExportCommand;

impl ExportCommand {
    pub fn execute(args: &str, conversation: &Conversation) -> CommandResult {
        if conversation.is_empty() {
            return CommandResult::Message("No conversation to export.".to_string());
        }

        let dir = if args.is_empty() { Path::new(".") } else { Path::new(args) };
        let today = chrono::Local::now().date_naive();
        match export_to(conversation, dir, today) {
            Ok(path) => CommandResult::Message(format!(
                "Exported {} turns to {}",
                conversation.len(),
                path.display()
            )),
            Err(e) => CommandResult::Message(format!("Export failed: {}", e)),
        }
    }
}

/// `rag-conversation-YYYY-MM-DD.json`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("rag-conversation-{}.json", date.format("%Y-%m-%d"))
}

/// Write the transcript into `dir`, returning the file written
pub fn export_to(conversation: &Conversation, dir: &Path, date: NaiveDate) -> std::io::Result<PathBuf> {
    let json = conversation.export_json().map_err(std::io::Error::other)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(date));
    std::fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::offline_conversation;

    #[test]
    fn test_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(export_file_name(date), "rag-conversation-2024-03-07.json");
    }

    #[test]
    fn test_empty_conversation_writes_nothing() {
        let conversation = offline_conversation();
        let result = ExportCommand::execute("", &conversation);
        assert_eq!(
            result,
            CommandResult::Message("No conversation to export.".to_string())
        );
    }

    #[test]
    fn test_export_to_writes_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();

        let path = export_to(&offline_conversation(), dir.path(), date).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value, serde_json::json!([]));
        assert!(path.ends_with("rag-conversation-2024-03-07.json"));
    }

    #[tokio::test]
    async fn test_export_writes_turns_in_order() {
        use musache_session::{EventBus, ManualClock};
        use std::sync::Arc;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/ask"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "answer": "It covers revenue.",
                "context_chunks": ["chunk"],
                "response_time": 0.75
            })))
            .expect(2)
            .mount(&server)
            .await;
        let client = musache_api::ApiClient::new(format!("{}/api/v1", server.uri())).unwrap();
        let conversation = Conversation::new(
            Arc::new(client),
            Arc::new(ManualClock::default()),
            EventBus::new(),
        );
        conversation.send("What is X?").await.unwrap();
        conversation.send("And Y?").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let path = export_to(&conversation, dir.path(), date).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let entries = written.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["question"], "What is X?");
        assert_eq!(entries[1]["question"], "And Y?");
        assert_eq!(entries[1]["answer"], "It covers revenue.");
        assert_eq!(entries[0]["response_time_seconds"], 0.75);
        assert!(entries[0]["timestamp"].is_string());
    }
}
