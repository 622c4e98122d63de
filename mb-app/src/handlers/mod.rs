//! Feature handlers and the shared context they run against.

mod callback;
mod info;
mod inline;
mod lyric;
mod music;
mod recognize;
mod rmcache;
mod search;
mod settings;

use crate::commands::command_arguments;
use crate::config::MusicBotConfig;
use crate::repository::TrackRepository;
use crate::resolve::Resolver;
use crate::router::{
    Router, callback_prefix, command, command_with_platform, inline_query,
    platform_command, platform_link, private_text,
};
use crate::settings::SettingsStore;
use mb_platform::{PlatformError, TrackRef};
use mb_telegram::{
    Dispatcher, EditMessageText, InlineKeyboardMarkup, InlineQueryResultArticle, Message,
    RateLimiter, SendMessage,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub use callback::MusicCallbackHandler;
pub use info::{AboutHandler, StartHandler, StatusHandler};
pub use inline::InlineHandler;
pub use lyric::LyricHandler;
pub use music::MusicHandler;
pub use recognize::RecognizeHandler;
pub use rmcache::RmcacheHandler;
pub use search::SearchHandler;
pub use settings::{SettingsCallbackHandler, SettingsHandler};

/// Process-wide state shared by every handler task.
pub struct AppContext {
    pub cfg: MusicBotConfig,
    pub bot_name: String,
    pub resolver: Resolver,
    pub repository: Arc<dyn TrackRepository>,
    pub settings: SettingsStore,
    pub dispatcher: Dispatcher,
    /// Spacing limiter for outbound calls; `None` sends directly without retry.
    pub limiter: Option<RateLimiter>,
    pub started_at: Instant,
}

impl AppContext {
    pub fn new(
        cfg: MusicBotConfig,
        bot_name: String,
        resolver: Resolver,
        repository: Arc<dyn TrackRepository>,
        dispatcher: Dispatcher,
        limiter: Option<RateLimiter>,
    ) -> Self {
        Self {
            cfg,
            bot_name,
            resolver,
            repository,
            settings: SettingsStore::new(),
            dispatcher,
            limiter,
            started_at: Instant::now(),
        }
    }

    /// Best-effort send; failures are logged, not propagated.
    pub async fn send(&self, cancel: &CancellationToken, request: SendMessage) -> Option<i64> {
        match self
            .dispatcher
            .send_message(self.limiter.as_ref(), cancel, &request)
            .await
        {
            Ok(message_id) => Some(message_id),
            Err(error) => {
                tracing::warn!(%error, chat_id = request.chat_id, "send failed");
                None
            }
        }
    }

    pub async fn reply(
        &self,
        cancel: &CancellationToken,
        message: &Message,
        text: impl Into<String>,
    ) -> Option<i64> {
        self.send(
            cancel,
            SendMessage::new(message.chat.id, text).reply_to(message.message_id),
        )
        .await
    }

    pub async fn reply_with_markup(
        &self,
        cancel: &CancellationToken,
        message: &Message,
        text: impl Into<String>,
        markup: InlineKeyboardMarkup,
    ) -> Option<i64> {
        self.send(
            cancel,
            SendMessage::new(message.chat.id, text)
                .reply_to(message.message_id)
                .with_markup(markup),
        )
        .await
    }

    pub async fn edit(
        &self,
        cancel: &CancellationToken,
        chat_id: i64,
        message_id: i64,
        text: impl Into<String>,
        markup: Option<InlineKeyboardMarkup>,
    ) -> bool {
        let request = EditMessageText {
            chat_id,
            message_id,
            text: text.into(),
            parse_mode: None,
            reply_markup: markup,
        };
        match self
            .dispatcher
            .edit_message_text(self.limiter.as_ref(), cancel, &request)
            .await
        {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(%error, chat_id, message_id, "edit failed");
                false
            }
        }
    }

    pub async fn delete(&self, cancel: &CancellationToken, chat_id: i64, message_id: i64) {
        if let Err(error) = self
            .dispatcher
            .delete_message(self.limiter.as_ref(), cancel, chat_id, message_id)
            .await
        {
            tracing::warn!(%error, chat_id, message_id, "delete failed");
        }
    }

    /// Edits `placeholder` when there is one, otherwise replies to `message`.
    pub async fn reply_or_edit(
        &self,
        cancel: &CancellationToken,
        message: &Message,
        placeholder: Option<i64>,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    ) {
        if let Some(message_id) = placeholder {
            if self
                .edit(cancel, message.chat.id, message_id, text.clone(), markup.clone())
                .await
            {
                return;
            }
        }
        let mut request = SendMessage::new(message.chat.id, text).reply_to(message.message_id);
        request.reply_markup = markup;
        self.send(cancel, request).await;
    }

    pub async fn answer_callback(
        &self,
        cancel: &CancellationToken,
        callback_query_id: &str,
        text: Option<&str>,
    ) {
        let api = self.dispatcher.api();
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = api.answer_callback_query(callback_query_id, text) => result,
        };
        if let Err(error) = result {
            tracing::warn!(%error, "answerCallbackQuery failed");
        }
    }

    pub async fn answer_inline(
        &self,
        cancel: &CancellationToken,
        inline_query_id: &str,
        results: &[InlineQueryResultArticle],
    ) {
        let api = self.dispatcher.api();
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = api.answer_inline_query(inline_query_id, results) => result,
        };
        if let Err(error) = result {
            tracing::warn!(%error, "answerInlineQuery failed");
        }
    }

    /// Runs a platform call under the configured timeout and `cancel`.
    pub async fn platform_call<T>(
        &self,
        cancel: &CancellationToken,
        call: impl Future<Output = mb_platform::Result<T>>,
    ) -> mb_platform::Result<T> {
        let timeout = self.cfg.music.platform_timeout();
        tokio::select! {
            _ = cancel.cancelled() => Err(PlatformError::Unavailable("request cancelled".to_string())),
            result = tokio::time::timeout(timeout, call) => match result {
                Ok(result) => result,
                Err(_) => Err(PlatformError::Unavailable(format!("timed out after {timeout:?}"))),
            },
        }
    }

    /// Track named by a command: the full pipeline, then `<platform> <id>`
    /// arguments with the likely-id fallback, then the replied-to message.
    pub async fn resolve_command_target(
        &self,
        message: &Message,
        cancel: &CancellationToken,
    ) -> Option<CommandTarget> {
        if let Some(track) = self.resolver.resolve(Some(message), cancel).await {
            return Some(CommandTarget::direct(track));
        }
        let args: Vec<&str> = command_arguments(message.text()).split_whitespace().collect();
        if let [platform, token, ..] = args.as_slice() {
            if let Some(track) = self.resolver.match_platform_track(platform, token) {
                return Some(CommandTarget::direct(track));
            }
        }
        self.resolver
            .resolve(message.reply_to_message.as_deref(), cancel)
            .await
            .map(|track| CommandTarget {
                track,
                from_reply: true,
            })
    }
}

/// A resolved track and whether it came from the replied-to message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTarget {
    pub track: TrackRef,
    pub from_reply: bool,
}

impl CommandTarget {
    fn direct(track: TrackRef) -> Self {
        Self {
            track,
            from_reply: false,
        }
    }
}

/// The dispatch table. Order matters: see [`crate::router`].
pub fn build_router(ctx: &AppContext) -> Router {
    let bot = ctx.bot_name.as_str();
    let music: Arc<MusicHandler> = Arc::new(MusicHandler);
    let netease = ctx
        .resolver
        .registry()
        .contains("netease")
        .then(|| "netease".to_string());

    Router::new()
        .route("start", command(bot, "start"), Arc::new(StartHandler))
        .route("music", command(bot, "music"), music.clone())
        .route(
            "netease",
            command_with_platform(bot, "netease", netease.clone()),
            music.clone(),
        )
        .route(
            "program",
            command_with_platform(bot, "program", netease),
            music.clone(),
        )
        .route("search", command(bot, "search"), Arc::new(SearchHandler))
        .route("lyric", command(bot, "lyric"), Arc::new(LyricHandler))
        .route("recognize", command(bot, "recognize"), Arc::new(RecognizeHandler))
        .route("about", command(bot, "about"), Arc::new(AboutHandler))
        .route("status", command(bot, "status"), Arc::new(StatusHandler))
        .route("settings", command(bot, "settings"), Arc::new(SettingsHandler))
        .route("rmcache", command(bot, "rmcache"), Arc::new(RmcacheHandler))
        .route(
            "platform_command",
            platform_command(bot, ctx.resolver.clone()),
            music.clone(),
        )
        .route(
            "platform_link",
            platform_link(ctx.resolver.clone()),
            music,
        )
        .route("private_search", private_text(), Arc::new(SearchHandler))
        .route(
            "music_callback",
            callback_prefix("music"),
            Arc::new(MusicCallbackHandler),
        )
        .route(
            "settings_callback",
            callback_prefix("settings"),
            Arc::new(SettingsCallbackHandler),
        )
        .route("inline", inline_query(), Arc::new(InlineHandler))
}
