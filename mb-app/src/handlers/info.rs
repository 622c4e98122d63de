//! Static and bookkeeping replies: `/start`, `/about`, `/status`.

use super::AppContext;
use crate::messages::{about_text, start_text};
use crate::router::{Handler, Request};
use async_trait::async_trait;
use mb_platform::PlatformMetadata;
use std::fmt::Write as _;

pub struct StartHandler;

#[async_trait]
impl Handler for StartHandler {
    async fn handle(&self, ctx: &AppContext, request: &Request<'_>) -> anyhow::Result<()> {
        let Some(message) = request.update.message.as_ref() else {
            return Ok(());
        };
        let platforms: Vec<&PlatformMetadata> = ctx
            .resolver
            .registry()
            .platforms()
            .map(|p| p.metadata())
            .collect();
        ctx.reply(&request.cancel, message, start_text(&platforms))
            .await;
        Ok(())
    }
}

pub struct AboutHandler;

#[async_trait]
impl Handler for AboutHandler {
    async fn handle(&self, ctx: &AppContext, request: &Request<'_>) -> anyhow::Result<()> {
        if let Some(message) = request.update.message.as_ref() {
            ctx.reply(&request.cancel, message, about_text()).await;
        }
        Ok(())
    }
}

pub struct StatusHandler;

#[async_trait]
impl Handler for StatusHandler {
    async fn handle(&self, ctx: &AppContext, request: &Request<'_>) -> anyhow::Result<()> {
        let Some(message) = request.update.message.as_ref() else {
            return Ok(());
        };
        let text = status_text(ctx, message.chat.id, message.from.as_ref().map(|u| u.id)).await?;
        ctx.reply(&request.cancel, message, text).await;
        Ok(())
    }
}

async fn status_text(
    ctx: &AppContext,
    chat_id: i64,
    user_id: Option<i64>,
) -> anyhow::Result<String> {
    let repo = &ctx.repository;
    let mut out = String::from("📊 Status");
    writeln!(out)?;
    writeln!(out, "Uptime: {}s", ctx.started_at.elapsed().as_secs())?;
    writeln!(out, "Cached tracks: {}", repo.count().await?)?;
    writeln!(out, "Sends: {}", repo.get_send_count().await?)?;
    writeln!(out, "This chat: {}", repo.count_by_chat_id(chat_id).await?)?;
    if let Some(user_id) = user_id {
        writeln!(out, "You: {}", repo.count_by_user_id(user_id).await?)?;
    }
    for platform in ctx.resolver.registry().platforms() {
        let meta = platform.metadata();
        write!(
            out,
            "\n{} {}: {}",
            meta.emoji,
            meta.display_name,
            repo.count_by_platform(&meta.name).await?
        )?;
    }
    Ok(out)
}
