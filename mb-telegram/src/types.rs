//! Subset of the Telegram Bot API object model the bot reads and writes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default)]
    pub inline_query: Option<InlineQuery>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    #[serde(default)]
    pub reply_to_message: Option<Box<Message>>,
    #[serde(default)]
    pub audio: Option<serde_json::Value>,
    #[serde(default)]
    pub voice: Option<serde_json::Value>,
}

impl Message {
    /// Message text, falling back to the media caption.
    pub fn text(&self) -> &str {
        self.text
            .as_deref()
            .or(self.caption.as_deref())
            .unwrap_or_default()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some() || self.voice.is_some()
    }

    pub fn language_code(&self) -> Option<&str> {
        self.from.as_ref().and_then(|u| u.language_code.as_deref())
    }

    /// Convenience constructor for plain text messages.
    pub fn with_text(chat: Chat, text: impl Into<String>) -> Self {
        Self {
            chat,
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyParameters {
    pub message_id: i64,
    pub allow_sending_without_reply: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SendMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_parameters: Option<ReplyParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl SendMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.reply_parameters = Some(ReplyParameters {
            message_id,
            allow_sending_without_reply: true,
        });
        self
    }

    pub fn with_markup(mut self, markup: InlineKeyboardMarkup) -> Self {
        self.reply_markup = Some(markup);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EditMessageText {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputTextMessageContent {
    pub message_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineQueryResultArticle {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_message_content: InputTextMessageContent,
}

impl InlineQueryResultArticle {
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: "article",
            id: id.into(),
            title: title.into(),
            description: None,
            input_message_content: InputTextMessageContent {
                message_text: text.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SendMessage, Update};

    #[test]
    fn update_deserializes_partial_payloads() {
        let raw = serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 5,
                "chat": {"id": -100, "type": "supergroup"},
                "text": "/music@mybot netease 1 hires",
                "entities": [{"type": "bot_command", "offset": 0, "length": 12}],
                "reply_to_message": {
                    "message_id": 4,
                    "chat": {"id": -100, "type": "supergroup"},
                    "caption": "netease:99"
                }
            }
        });
        let update: Update = serde_json::from_value(raw).expect("valid update");
        let message = update.message.expect("message present");
        assert!(!message.chat.is_private());
        assert_eq!(message.entities[0].kind, "bot_command");
        let reply = message.reply_to_message.expect("reply present");
        assert_eq!(reply.text(), "netease:99");
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn send_message_omits_unset_fields() {
        let body = serde_json::to_value(SendMessage::new(1, "hi").reply_to(7))
            .expect("serializable");
        assert_eq!(body["reply_parameters"]["message_id"], 7);
        assert!(body.get("parse_mode").is_none());
        assert!(body.get("reply_markup").is_none());
    }
}
