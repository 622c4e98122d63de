use super::AppContext;
use crate::commands::command_arguments;
use crate::messages::{self, Lang, Text};
use crate::router::{Handler, Request};
use async_trait::async_trait;

/// `/rmcache <platform> <id>`: drops every cached quality of one track.
/// Admins only.
pub struct RmcacheHandler;

#[async_trait]
impl Handler for RmcacheHandler {
    async fn handle(&self, ctx: &AppContext, request: &Request<'_>) -> anyhow::Result<()> {
        let Some(message) = request.update.message.as_ref() else {
            return Ok(());
        };
        let lang = Lang::from_code(message.language_code());
        let cancel = &request.cancel;

        let is_admin = message
            .from
            .as_ref()
            .is_some_and(|user| ctx.cfg.is_admin(user.id));
        if !is_admin {
            ctx.reply(cancel, message, messages::text(lang, Text::RmcacheDenied))
                .await;
            return Ok(());
        }

        let args: Vec<&str> = command_arguments(message.text()).split_whitespace().collect();
        let target = match args.as_slice() {
            [platform, token, ..] => ctx.resolver.match_platform_track(platform, token),
            _ => ctx.resolver.resolve_with_reply(message, cancel).await,
        };
        let Some(track_ref) = target else {
            ctx.reply(cancel, message, messages::text(lang, Text::RmcacheUsage))
                .await;
            return Ok(());
        };

        ctx.repository
            .delete_all_qualities_by_platform_track_id(&track_ref.platform, &track_ref.track_id)
            .await?;
        tracing::info!(platform = %track_ref.platform, track_id = %track_ref.track_id, "cache entries removed");
        let reply = format!(
            "{} {}:{}",
            messages::text(lang, Text::RmcacheDone),
            track_ref.platform,
            track_ref.track_id
        );
        ctx.reply(cancel, message, reply).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{message_update, request, test_context, user_message};
    use crate::repository::SendRecord;
    use crate::resolve::tests::message;
    use crate::router::RouteMatch;
    use mb_platform::Quality;

    async fn seed(ctx: &AppContext) {
        for quality in [Quality::Hires, Quality::Standard] {
            ctx.repository
                .record_send(SendRecord {
                    platform: "netease".to_string(),
                    track_id: "12345".to_string(),
                    quality,
                    chat_id: 1,
                    user_id: 42,
                })
                .await
                .expect("record");
        }
    }

    #[tokio::test]
    async fn admin_removes_all_qualities() {
        let (ctx, api) = test_context();
        seed(&ctx).await;
        let update = message_update(user_message("/rmcache netease 12345"));
        RmcacheHandler
            .handle(&ctx, &request(&update, RouteMatch::default()))
            .await
            .expect("handle");
        assert_eq!(ctx.repository.count().await.expect("count"), 0);
        assert_eq!(api.sent_texts(), vec!["Cache cleared for netease:12345".to_string()]);
    }

    #[tokio::test]
    async fn non_admins_and_bad_ids_are_refused() {
        let (ctx, api) = test_context();
        seed(&ctx).await;
        let update = message_update(message("/rmcache netease 12345"));
        RmcacheHandler
            .handle(&ctx, &request(&update, RouteMatch::default()))
            .await
            .expect("handle");

        let update = message_update(user_message("/rmcache netease jj"));
        RmcacheHandler
            .handle(&ctx, &request(&update, RouteMatch::default()))
            .await
            .expect("handle");

        assert_eq!(ctx.repository.count().await.expect("count"), 2);
        assert_eq!(
            api.sent_texts(),
            vec![
                "Only bot admins can clear the cache.".to_string(),
                "Usage: /rmcache <platform> <track id>".to_string()
            ]
        );
    }
}
