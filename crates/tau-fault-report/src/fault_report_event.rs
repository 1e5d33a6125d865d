//! Inbound bot events as a tagged union.
//!
//! Only two event shapes carry a chat the user can be answered in: a direct
//! message, and a callback query whose parent message is still known. Every
//! other update kind is kept as an opaque payload for the diagnostic report.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
/// Chat/message coordinates of a message a callback query was attached to.
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
/// Enumerates supported `BotEvent` values.
pub enum BotEvent {
    Message {
        update_id: i64,
        chat_id: i64,
        message_id: i64,
        from_user_id: Option<i64>,
        text: Option<String>,
    },
    CallbackQuery {
        update_id: i64,
        query_id: String,
        from_user_id: Option<i64>,
        data: Option<String>,
        message: Option<MessageRef>,
    },
    Other {
        update_id: i64,
        kind: String,
        payload: Value,
    },
}

impl BotEvent {
    pub fn update_id(&self) -> i64 {
        match self {
            Self::Message { update_id, .. }
            | Self::CallbackQuery { update_id, .. }
            | Self::Other { update_id, .. } => *update_id,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Message { .. } => "message",
            Self::CallbackQuery { .. } => "callback_query",
            Self::Other { kind, .. } => kind.as_str(),
        }
    }

    /// Chat that should receive a user-facing notice for this event.
    pub fn destination_chat(&self) -> Option<i64> {
        match self {
            Self::Message { chat_id, .. } => Some(*chat_id),
            Self::CallbackQuery { message, .. } => message.map(|message| message.chat_id),
            Self::Other { .. } => None,
        }
    }

    /// Serialized form embedded in diagnostic reports.
    pub fn repr(&self) -> String {
        format!("{self:?}")
    }
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
    callback_query: Option<TelegramCallbackQuery>,
    #[serde(flatten)]
    extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    chat: TelegramChat,
    from: Option<TelegramUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramCallbackQuery {
    id: String,
    from: Option<TelegramUser>,
    data: Option<String>,
    message: Option<TelegramMessage>,
}

/// Parses a Telegram Bot API `Update` object into a [`BotEvent`].
pub fn parse_telegram_update(raw: &Value) -> Result<BotEvent> {
    let update = serde_json::from_value::<TelegramUpdate>(raw.clone())
        .context("failed to parse telegram update")?;

    if let Some(message) = update.message {
        return Ok(BotEvent::Message {
            update_id: update.update_id,
            chat_id: message.chat.id,
            message_id: message.message_id,
            from_user_id: message.from.map(|user| user.id),
            text: message.text,
        });
    }
    if let Some(query) = update.callback_query {
        return Ok(BotEvent::CallbackQuery {
            update_id: update.update_id,
            query_id: query.id,
            from_user_id: query.from.map(|user| user.id),
            data: query.data,
            message: query.message.map(|message| MessageRef {
                chat_id: message.chat.id,
                message_id: message.message_id,
            }),
        });
    }
    let Some((kind, payload)) = update.extra.into_iter().next() else {
        bail!(
            "telegram update {} does not carry any event payload",
            update.update_id
        );
    };
    Ok(BotEvent::Other {
        update_id: update.update_id,
        kind,
        payload,
    })
}
