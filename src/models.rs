use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subset of the Telegram `Update` object the bot cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

/// A text message pulled out of an update, ready for classification.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub update_id: i64,
    pub chat_id: i64,
    pub sender_id: Option<i64>,
    pub message_id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// Returns `None` for updates that carry no text message.
    pub fn from_update(update: &Update) -> Option<Self> {
        let message = update.message.as_ref()?;
        let text = message.text.clone()?;
        Some(Self {
            update_id: update.update_id,
            chat_id: message.chat.id,
            sender_id: message.from.as_ref().map(|user| user.id),
            message_id: message.message_id,
            text,
            timestamp: DateTime::<Utc>::from_timestamp(message.date, 0).unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusBody {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_update_becomes_inbound_message() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 10,
            "message": {
                "message_id": 7,
                "date": 1_700_000_000,
                "chat": {"id": 42, "type": "private"},
                "from": {"id": 99, "is_bot": false, "first_name": "A"},
                "text": "hi"
            }
        }))
        .expect("update");
        let inbound = InboundMessage::from_update(&update).expect("text message");
        assert_eq!(inbound.chat_id, 42);
        assert_eq!(inbound.sender_id, Some(99));
        assert_eq!(inbound.message_id, 7);
        assert_eq!(inbound.text, "hi");
        assert_eq!(inbound.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn non_text_update_is_skipped() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 11,
            "message": {
                "message_id": 8,
                "date": 1_700_000_000,
                "chat": {"id": 42},
                "sticker": {"file_id": "x"}
            }
        }))
        .expect("update");
        assert!(InboundMessage::from_update(&update).is_none());

        let callback_only: Update =
            serde_json::from_value(json!({"update_id": 12, "callback_query": {}}))
                .expect("update");
        assert!(InboundMessage::from_update(&callback_only).is_none());
    }
}
