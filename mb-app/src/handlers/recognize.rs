use super::AppContext;
use crate::messages::{self, Lang, Text};
use crate::router::{Handler, Request};
use async_trait::async_trait;

/// `/recognize` in reply to a voice or audio message. No recognition backend
/// ships with this build, so valid requests are answered as unsupported.
pub struct RecognizeHandler;

#[async_trait]
impl Handler for RecognizeHandler {
    async fn handle(&self, ctx: &AppContext, request: &Request<'_>) -> anyhow::Result<()> {
        let Some(message) = request.update.message.as_ref() else {
            return Ok(());
        };
        let lang = Lang::from_code(message.language_code());
        let has_audio = message
            .reply_to_message
            .as_deref()
            .is_some_and(|reply| reply.has_audio());
        let key = if has_audio {
            Text::RecognizeUnsupported
        } else {
            Text::RecognizeUsage
        };
        ctx.reply(&request.cancel, message, messages::text(lang, key))
            .await;
        Ok(())
    }
}
