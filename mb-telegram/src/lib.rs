//! Telegram transport for musicbot.
//!
//! The adapter is pure I/O: serde types for inbound updates, a thin Bot API
//! client, the long-poll loop, and the rate-limited dispatcher that every
//! outbound send/edit/delete goes through.

mod api;
mod dispatch;
mod error;
mod limiter;
mod poller;
mod types;

pub use api::{BotApi, TelegramApi};
pub use dispatch::{Dispatcher, RetryPolicy};
pub use error::{Result, TransportError};
pub use limiter::{OperationKind, RateLimiter};
pub use poller::run_poll_loop;
pub use types::{
    CallbackQuery, Chat, EditMessageText, InlineKeyboardButton, InlineKeyboardMarkup,
    InlineQuery, InlineQueryResultArticle, InputTextMessageContent, Message, MessageEntity,
    ReplyParameters, SendMessage, Update, User,
};
