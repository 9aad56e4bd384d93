//! Report store payloads

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};

use crate::types::{Message, Role};

/// Ids arrive as integers from the report store; accept strings too.
fn string_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Str(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Int(id) => id.to_string(),
        RawId::Str(id) => id,
    })
}

/// Entry of `GET /reports`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Report {
    #[serde(deserialize_with = "string_id")]
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

/// One stored chat message
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryMessage {
    #[serde(deserialize_with = "string_id")]
    pub id: String,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

/// Response of `GET /reports/thread/{thread_id}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadHistory {
    #[serde(deserialize_with = "string_id")]
    pub id: String,
    pub thread_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

impl ThreadHistory {
    /// Convert to finished log messages, oldest first.
    ///
    /// Unknown roles are kept as assistant messages.
    pub fn into_messages(self) -> Vec<Message> {
        let thread_id = self.thread_id;
        self.messages
            .into_iter()
            .map(|m| {
                let role = m.role.parse::<Role>().unwrap_or_else(|_| {
                    tracing::debug!(role = %m.role, "Unknown history role, using assistant");
                    Role::Assistant
                });
                Message::from_history(m.id, thread_id.clone(), role, m.content)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_thread_history() {
        let json = r#"{
            "id": 7,
            "thread_id": "abc",
            "title": "NVDA outlook",
            "content": "Report body",
            "created_at": "2025-05-01T10:20:30.123456",
            "updated_at": "2025-05-01T10:25:00",
            "messages": [
                {"id": 1, "role": "user", "content": "Analyze NVDA", "created_at": "2025-05-01T10:20:30"},
                {"id": 2, "role": "assistant", "content": "Here is the analysis", "created_at": null},
                {"id": 3, "role": "tool", "content": "{}"}
            ]
        }"#;
        let history: ThreadHistory = serde_json::from_str(json).unwrap();
        assert_eq!(history.id, "7");
        assert!(history.created_at.is_some());

        let messages = history.into_messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].id, "1");
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].thread_id, "abc");
        assert_eq!(messages[1].content, "Here is the analysis");
        assert!(!messages[1].is_streaming);
        assert_eq!(messages[2].role, Role::Assistant);
    }

    #[test]
    fn test_parse_report_list() {
        let json = r#"[
            {"id": 1, "user_id": 3, "thread_id": "t1", "title": "AAPL", "content": "...", "analysis": null,
             "created_at": "2025-04-01T08:00:00", "updated_at": "2025-04-01T08:00:00"},
            {"id": "r-2", "title": "Untitled"}
        ]"#;
        let reports: Vec<Report> = serde_json::from_str(json).unwrap();
        assert_eq!(reports[0].id, "1");
        assert_eq!(reports[0].thread_id.as_deref(), Some("t1"));
        assert_eq!(reports[1].id, "r-2");
        assert!(reports[1].content.is_empty());
    }
}
