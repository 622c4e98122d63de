use super::AppContext;
use super::lyric::send_lyrics;
use crate::messages::Lang;
use crate::router::{Handler, Request};
use async_trait::async_trait;
use mb_platform::TrackRef;

/// Buttons attached to track cards. Only `music lyric <platform> <id>` is
/// produced today; unknown actions are acknowledged and ignored.
pub struct MusicCallbackHandler;

#[async_trait]
impl Handler for MusicCallbackHandler {
    async fn handle(&self, ctx: &AppContext, request: &Request<'_>) -> anyhow::Result<()> {
        let Some(query) = request.update.callback_query.as_ref() else {
            return Ok(());
        };
        let cancel = &request.cancel;
        ctx.answer_callback(cancel, &query.id, None).await;

        let data = query.data.as_deref().unwrap_or_default();
        let parts: Vec<&str> = data.split_whitespace().collect();
        let ["music", "lyric", platform, track_id] = parts.as_slice() else {
            tracing::debug!(data, "ignoring music callback");
            return Ok(());
        };
        let Some(message) = &query.message else {
            return Ok(());
        };
        let lang = Lang::from_code(query.from.language_code.as_deref());
        let track_ref = TrackRef::new(*platform, *track_id);
        send_lyrics(
            ctx,
            cancel,
            message.chat.id,
            Some(message.message_id),
            lang,
            &track_ref,
        )
        .await;
        Ok(())
    }
}
