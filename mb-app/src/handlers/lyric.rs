use super::AppContext;
use crate::messages::{self, Lang, Text, describe_platform_error, render_lyrics};
use crate::router::{Handler, Request};
use async_trait::async_trait;
use mb_platform::TrackRef;
use mb_telegram::SendMessage;
use tokio_util::sync::CancellationToken;

/// `/lyric`: lyrics for the track named by the command or its reply.
pub struct LyricHandler;

#[async_trait]
impl Handler for LyricHandler {
    async fn handle(&self, ctx: &AppContext, request: &Request<'_>) -> anyhow::Result<()> {
        let Some(message) = request.update.message.as_ref() else {
            return Ok(());
        };
        let lang = Lang::from_code(message.language_code());
        let cancel = &request.cancel;
        let Some(target) = ctx.resolve_command_target(message, cancel).await else {
            ctx.reply(cancel, message, messages::text(lang, Text::NotRecognized))
                .await;
            return Ok(());
        };
        send_lyrics(
            ctx,
            cancel,
            message.chat.id,
            Some(message.message_id),
            lang,
            &target.track,
        )
        .await;
        Ok(())
    }
}

/// Fetches and sends lyrics for `track_ref`; every outcome produces a reply.
pub(super) async fn send_lyrics(
    ctx: &AppContext,
    cancel: &CancellationToken,
    chat_id: i64,
    reply_to: Option<i64>,
    lang: Lang,
    track_ref: &TrackRef,
) {
    let text = match ctx.resolver.registry().get(&track_ref.platform) {
        None => messages::text(lang, Text::NotRecognized).to_string(),
        Some(platform) if !platform.supports_lyrics() => {
            messages::text(lang, Text::LyricsUnsupported).to_string()
        }
        Some(platform) => match ctx
            .platform_call(cancel, platform.get_lyrics(&track_ref.track_id))
            .await
        {
            Ok(lyrics) if lyrics.is_empty() => messages::text(lang, Text::LyricsEmpty).to_string(),
            Ok(lyrics) => render_lyrics(&lyrics),
            Err(error) => {
                tracing::info!(%error, platform = %track_ref.platform, track_id = %track_ref.track_id, "lyrics lookup failed");
                describe_platform_error(lang, &error).to_string()
            }
        },
    };
    let mut request = SendMessage::new(chat_id, text);
    if let Some(message_id) = reply_to {
        request = request.reply_to(message_id);
    }
    ctx.send(cancel, request).await;
}
