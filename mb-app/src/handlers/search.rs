use super::AppContext;
use crate::commands::command_arguments;
use crate::messages::{self, Lang, Text, describe_platform_error, search_results};
use crate::router::{Handler, Request};
use async_trait::async_trait;
use mb_platform::Platform;
use std::sync::Arc;

/// `/search [platform] <keywords>` and free text in private chats.
pub struct SearchHandler;

#[async_trait]
impl Handler for SearchHandler {
    async fn handle(&self, ctx: &AppContext, request: &Request<'_>) -> anyhow::Result<()> {
        let Some(message) = request.update.message.as_ref() else {
            return Ok(());
        };
        let lang = Lang::from_code(message.language_code());
        let cancel = &request.cancel;
        let text = message.text().trim();
        let query = if text.starts_with('/') {
            command_arguments(text)
        } else {
            text
        };

        let (platform, keyword) = split_platform(ctx, query);
        let Some(platform) = platform else {
            ctx.reply(cancel, message, messages::text(lang, Text::SearchUnsupported))
                .await;
            return Ok(());
        };
        if keyword.is_empty() {
            ctx.reply(cancel, message, messages::text(lang, Text::SearchUsage))
                .await;
            return Ok(());
        }
        if !platform.supports_search() {
            ctx.reply(cancel, message, messages::text(lang, Text::SearchUnsupported))
                .await;
            return Ok(());
        }

        let limit = ctx.cfg.music.search_limit;
        let reply = match ctx
            .platform_call(cancel, platform.search(keyword, limit))
            .await
        {
            Ok(tracks) if tracks.is_empty() => messages::text(lang, Text::SearchEmpty).to_string(),
            Ok(tracks) => search_results(platform.metadata(), &tracks),
            Err(error) => {
                tracing::info!(%error, platform = platform.name(), "search failed");
                describe_platform_error(lang, &error).to_string()
            }
        };
        ctx.reply(cancel, message, reply).await;
        Ok(())
    }
}

/// Leading registered platform name, else the default platform, else the
/// first platform that can search.
fn split_platform<'a>(ctx: &AppContext, query: &'a str) -> (Option<Arc<dyn Platform>>, &'a str) {
    let registry = ctx.resolver.registry();
    if let Some((first, rest)) = query.split_once(char::is_whitespace) {
        if let Some(platform) = registry.get(first) {
            return (Some(platform), rest.trim());
        }
    }
    let fallback = ctx
        .cfg
        .default_platform()
        .and_then(|name| registry.get(name))
        .or_else(|| registry.platforms().find(|p| p.supports_search()).cloned());
    (fallback, query.trim())
}
