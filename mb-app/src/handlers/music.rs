//! Track lookups: `/music`, `/netease`, `/program`, `/<platform>` and bare
//! links or ids.

use super::AppContext;
use crate::commands::command_arguments;
use crate::messages::{self, Lang, Text, describe_platform_error, track_card};
use crate::quality::{extract_quality, quality_from_text};
use crate::repository::SendRecord;
use crate::router::{Handler, Request};
use async_trait::async_trait;
use mb_platform::{PlatformError, Quality, TrackRef};
use mb_telegram::{InlineKeyboardButton, InlineKeyboardMarkup, Message};
use tokio_util::sync::CancellationToken;

pub struct MusicHandler;

#[async_trait]
impl Handler for MusicHandler {
    #[tracing::instrument(level = "debug", skip_all, fields(platform = ?request.route.platform))]
    async fn handle(&self, ctx: &AppContext, request: &Request<'_>) -> anyhow::Result<()> {
        let Some(message) = request.update.message.as_ref() else {
            return Ok(());
        };
        let lang = Lang::from_code(message.language_code());
        let cancel = &request.cancel;

        let (target, requested) = match request.route.platform.as_deref() {
            Some(platform) => scoped_target(ctx, message, platform, cancel).await,
            None => match ctx.resolve_command_target(message, cancel).await {
                Some(target) => {
                    let requested = requested_quality(message, target.from_reply);
                    (Some(target.track), requested)
                }
                None => (None, None),
            },
        };

        let Some(track_ref) = target else {
            let key = if ctx.resolver.registry().match_playlist(message.text()).is_some() {
                Text::Unsupported
            } else {
                Text::NotRecognized
            };
            ctx.reply(cancel, message, messages::text(lang, key)).await;
            return Ok(());
        };

        let user_id = message.from.as_ref().map(|u| u.id);
        let quality =
            ctx.settings
                .effective_quality(user_id, requested, ctx.cfg.music.default_quality);
        send_track(ctx, cancel, message, lang, &track_ref, quality).await;
        Ok(())
    }
}

/// Target and quality for a platform pre-selected by the route:
/// `/<platform> <id-or-link> [quality]`, else the replied-to message.
async fn scoped_target(
    ctx: &AppContext,
    message: &Message,
    platform: &str,
    cancel: &CancellationToken,
) -> (Option<TrackRef>, Option<Quality>) {
    let args: Vec<&str> = command_arguments(message.text()).split_whitespace().collect();
    if let Some((token, rest)) = args.split_first() {
        let quality = quality_from_text(&rest.join(" "));
        let from_token = ctx.resolver.match_platform_track(platform, token).or_else(|| {
            let adapter = ctx.resolver.registry().get(platform)?;
            adapter
                .match_url(token)
                .map(|track_id| TrackRef::new(platform, track_id))
        });
        return (from_token, quality);
    }
    let replied = ctx
        .resolver
        .resolve(message.reply_to_message.as_deref(), cancel)
        .await
        .filter(|track| track.platform == platform);
    let quality = replied
        .as_ref()
        .and_then(|_| extract_quality(message.reply_to_message.as_deref()));
    (replied, quality)
}

/// The command's own override, else the replied-to text's when the track came
/// from the reply.
fn requested_quality(message: &Message, from_reply: bool) -> Option<Quality> {
    extract_quality(Some(message)).or_else(|| {
        from_reply
            .then(|| extract_quality(message.reply_to_message.as_deref()))
            .flatten()
    })
}

pub(super) fn lyric_keyboard(lang: Lang, track_ref: &TrackRef) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![InlineKeyboardButton {
            text: messages::text(lang, Text::LyricsButton).to_string(),
            callback_data: format!("music lyric {} {}", track_ref.platform, track_ref.track_id),
        }]],
    }
}

async fn send_track(
    ctx: &AppContext,
    cancel: &CancellationToken,
    message: &Message,
    lang: Lang,
    track_ref: &TrackRef,
    quality: Quality,
) {
    let Some(platform) = ctx.resolver.registry().get(&track_ref.platform) else {
        ctx.reply(cancel, message, messages::text(lang, Text::NotRecognized))
            .await;
        return;
    };
    let placeholder = ctx
        .reply(cancel, message, messages::text(lang, Text::Resolving))
        .await;

    let track = match ctx
        .platform_call(cancel, platform.get_track(&track_ref.track_id))
        .await
    {
        Ok(track) => Some(track),
        Err(PlatformError::Unsupported(_)) => None,
        Err(error) => {
            tracing::info!(%error, platform = %track_ref.platform, track_id = %track_ref.track_id, "track lookup failed");
            let text = describe_platform_error(lang, &error).to_string();
            ctx.reply_or_edit(cancel, message, placeholder, text, None)
                .await;
            return;
        }
    };

    let record = SendRecord {
        platform: track_ref.platform.clone(),
        track_id: track_ref.track_id.clone(),
        quality,
        chat_id: message.chat.id,
        user_id: message.from.as_ref().map_or(0, |u| u.id),
    };
    if let Err(error) = ctx.repository.record_send(record).await {
        tracing::warn!(%error, "failed to record send");
    }

    let card = track_card(platform.metadata(), track_ref, track.as_ref(), quality);
    let markup = platform
        .supports_lyrics()
        .then(|| lyric_keyboard(lang, track_ref));
    ctx.reply_or_edit(cancel, message, placeholder, card, markup)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{message_update, request, test_context, user_message};
    use crate::resolve::tests::message;
    use crate::router::RouteMatch;

    #[tokio::test]
    async fn free_text_track_is_resolved_recorded_and_carded() {
        let (ctx, api) = test_context();
        let update = message_update(user_message("https://music.163.com/song?id=12345 lossless"));
        MusicHandler
            .handle(&ctx, &request(&update, RouteMatch::default()))
            .await
            .expect("handle");

        assert_eq!(api.sent_texts(), vec!["⏳ Resolving…".to_string()]);
        let edits = api.edits.lock().expect("lock").clone();
        assert_eq!(edits.len(), 1);
        assert!(edits[0].text.contains("Song 12345"));
        assert!(edits[0].text.contains("lossless"));
        let markup = edits[0].reply_markup.clone().expect("lyric button");
        assert_eq!(
            markup.inline_keyboard[0][0].callback_data,
            "music lyric netease 12345"
        );
        assert_eq!(ctx.repository.count().await.expect("count"), 1);
        assert_eq!(ctx.repository.count_by_user_id(42).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn user_setting_applies_without_override() {
        let (ctx, api) = test_context();
        ctx.settings.set_quality(42, Quality::Standard);
        let update = message_update(user_message("/music netease 12345"));
        MusicHandler
            .handle(&ctx, &request(&update, RouteMatch::default()))
            .await
            .expect("handle");
        assert!(api.edit_texts()[0].contains("standard"));
    }

    #[tokio::test]
    async fn scoped_command_uses_likely_id_and_trailing_quality() {
        let (ctx, api) = test_context();
        let update = message_update(user_message("/netease 12345 high"));
        MusicHandler
            .handle(&ctx, &request(&update, RouteMatch::with_platform("netease")))
            .await
            .expect("handle");
        let edits = api.edit_texts();
        assert!(edits[0].contains("Song 12345"));
        assert!(edits[0].contains("high"));
    }

    #[tokio::test]
    async fn command_argument_matching_a_text_rule_is_resolved() {
        let (ctx, api) = test_context();
        let update = message_update(user_message("/music netease:12345"));
        MusicHandler
            .handle(&ctx, &request(&update, RouteMatch::default()))
            .await
            .expect("handle");
        assert!(api.edit_texts()[0].contains("Song 12345"));
    }

    #[tokio::test]
    async fn quality_follows_the_replied_to_message() {
        let (ctx, api) = test_context();
        let mut msg = user_message("/music");
        msg.reply_to_message = Some(Box::new(message(
            "https://music.163.com/song?id=5 lossless",
        )));
        let update = message_update(msg);
        MusicHandler
            .handle(&ctx, &request(&update, RouteMatch::default()))
            .await
            .expect("handle");
        let card = &api.edit_texts()[0];
        assert!(card.contains("Song 5"));
        assert!(card.ends_with("🎚 lossless"));
    }

    #[tokio::test]
    async fn scoped_reply_carries_its_quality_too() {
        let (ctx, api) = test_context();
        let mut msg = user_message("/netease");
        msg.reply_to_message = Some(Box::new(message("https://music.163.com/song?id=8 low")));
        let update = message_update(msg);
        MusicHandler
            .handle(&ctx, &request(&update, RouteMatch::with_platform("netease")))
            .await
            .expect("handle");
        assert!(api.edit_texts()[0].ends_with("🎚 standard"));
    }

    #[tokio::test]
    async fn command_override_beats_replied_to_quality() {
        let (ctx, api) = test_context();
        let mut msg = user_message("/music netease 5 high");
        msg.reply_to_message = Some(Box::new(message(
            "https://music.163.com/song?id=5 lossless",
        )));
        let update = message_update(msg);
        MusicHandler
            .handle(&ctx, &request(&update, RouteMatch::default()))
            .await
            .expect("handle");
        assert!(api.edit_texts()[0].ends_with("🎚 high"));
    }

    #[tokio::test]
    async fn platform_without_metadata_still_gets_a_card() {
        let (ctx, api) = test_context();
        let update = message_update(user_message("/tidal abc123"));
        MusicHandler
            .handle(&ctx, &request(&update, RouteMatch::with_platform("tidal")))
            .await
            .expect("handle");
        let edits = api.edits.lock().expect("lock").clone();
        assert!(edits[0].text.contains("#abc123"));
        assert!(edits[0].reply_markup.is_none());
    }

    #[tokio::test]
    async fn unresolvable_and_missing_tracks_get_error_replies() {
        let (ctx, api) = test_context();
        let update = message_update(user_message("/music"));
        MusicHandler
            .handle(&ctx, &request(&update, RouteMatch::default()))
            .await
            .expect("handle");
        assert_eq!(
            api.sent_texts(),
            vec!["Could not recognise a track in that message.".to_string()]
        );

        let update = message_update(message("netease:404"));
        MusicHandler
            .handle(&ctx, &request(&update, RouteMatch::default()))
            .await
            .expect("handle");
        assert_eq!(api.edit_texts(), vec!["Track not found.".to_string()]);
        assert_eq!(ctx.repository.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn playlists_are_unsupported() {
        let (ctx, api) = test_context();
        let update = message_update(user_message("https://music.163.com/playlist?id=9"));
        MusicHandler
            .handle(&ctx, &request(&update, RouteMatch::default()))
            .await
            .expect("handle");
        assert_eq!(
            api.sent_texts(),
            vec!["This platform does not support that.".to_string()]
        );
    }
}
