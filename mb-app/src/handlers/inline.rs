use super::AppContext;
use crate::messages::track_card;
use crate::quality::quality_from_text;
use crate::router::{Handler, Request};
use async_trait::async_trait;
use mb_telegram::{InlineQueryResultArticle, Message};

/// Inline mode: one article describing the track named by the query, or an
/// empty answer.
pub struct InlineHandler;

#[async_trait]
impl Handler for InlineHandler {
    async fn handle(&self, ctx: &AppContext, request: &Request<'_>) -> anyhow::Result<()> {
        let Some(query) = request.update.inline_query.as_ref() else {
            return Ok(());
        };
        let cancel = &request.cancel;
        let text = query.query.trim();
        if text.is_empty() {
            ctx.answer_inline(cancel, &query.id, &[]).await;
            return Ok(());
        }

        let as_message = Message {
            from: Some(query.from.clone()),
            ..Message::with_text(Default::default(), text)
        };
        let Some(track_ref) = ctx.resolver.resolve(Some(&as_message), cancel).await else {
            ctx.answer_inline(cancel, &query.id, &[]).await;
            return Ok(());
        };
        let Some(platform) = ctx.resolver.registry().get(&track_ref.platform) else {
            ctx.answer_inline(cancel, &query.id, &[]).await;
            return Ok(());
        };

        let quality = ctx.settings.effective_quality(
            Some(query.from.id),
            quality_from_text(text),
            ctx.cfg.music.default_quality,
        );
        let track = ctx
            .platform_call(cancel, platform.get_track(&track_ref.track_id))
            .await
            .ok();
        let meta = platform.metadata();
        let title = track.as_ref().map_or_else(
            || format!("{} {}", meta.display_name, track_ref.track_id),
            |t| t.title.clone(),
        );
        let mut article = InlineQueryResultArticle::new(
            format!("{}:{}", track_ref.platform, track_ref.track_id),
            title,
            track_card(meta, &track_ref, track.as_ref(), quality),
        );
        article.description = Some(format!("{} {}", meta.emoji, meta.display_name));
        ctx.answer_inline(cancel, &query.id, &[article]).await;
        Ok(())
    }
}
