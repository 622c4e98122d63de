//! Ordered predicate dispatch.
//!
//! Routes are evaluated strictly in registration order and the first
//! predicate that accepts an update owns it. Later catch-all routes rely on
//! the more specific ones above them having claimed their updates already.

use crate::commands::{addressed_command, is_reserved_command, matches_command};
use crate::handlers::AppContext;
use crate::messages::{Lang, describe_error};
use crate::resolve::Resolver;
use async_trait::async_trait;
use mb_telegram::{Message, Update};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a predicate learned while matching, handed to the handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
    /// Platform chosen by the route itself (`/netease`, `/<platform>`).
    pub platform: Option<String>,
}

impl RouteMatch {
    pub fn with_platform(platform: impl Into<String>) -> Self {
        Self {
            platform: Some(platform.into()),
        }
    }
}

pub struct Request<'a> {
    pub update: &'a Update,
    pub route: RouteMatch,
    pub cancel: CancellationToken,
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &AppContext, request: &Request<'_>) -> anyhow::Result<()>;
}

pub type Predicate = Box<dyn Fn(&Update) -> Option<RouteMatch> + Send + Sync>;

struct Route {
    name: String,
    predicate: Predicate,
    handler: Arc<dyn Handler>,
}

#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        name: impl Into<String>,
        predicate: Predicate,
        handler: Arc<dyn Handler>,
    ) -> Self {
        self.routes.push(Route {
            name: name.into(),
            predicate,
            handler,
        });
        self
    }

    pub fn route_names(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.name.as_str()).collect()
    }

    /// First route whose predicate accepts `update`.
    pub fn select(&self, update: &Update) -> Option<(&str, RouteMatch, Arc<dyn Handler>)> {
        self.routes.iter().find_map(|route| {
            (route.predicate)(update)
                .map(|matched| (route.name.as_str(), matched, route.handler.clone()))
        })
    }

    /// Runs the selected handler. Handler errors are logged and answered with a
    /// localised failure message. Returns false when no route matched.
    #[tracing::instrument(level = "info", skip_all, fields(update_id = update.update_id))]
    pub async fn dispatch(
        &self,
        ctx: &AppContext,
        update: &Update,
        cancel: CancellationToken,
    ) -> bool {
        let Some((name, route, handler)) = self.select(update) else {
            tracing::debug!("no route matched; ignoring update");
            return false;
        };
        tracing::debug!(route = name, platform = ?route.platform, "route selected");
        let request = Request {
            update,
            route,
            cancel,
        };
        if let Err(error) = handler.handle(ctx, &request).await {
            tracing::warn!(route = name, %error, "handler failed");
            if let Some(message) = &update.message {
                let lang = Lang::from_code(message.language_code());
                ctx.reply(&request.cancel, message, describe_error(lang, &error))
                    .await;
            }
        }
        true
    }
}

fn message_text(update: &Update) -> Option<&str> {
    update
        .message
        .as_ref()
        .map(Message::text)
        .filter(|text| !text.is_empty())
}

/// `/cmd` or `/cmd@bot_name`.
pub fn command(bot_name: &str, cmd: &'static str) -> Predicate {
    command_with_platform(bot_name, cmd, None)
}

/// Like [`command`], pre-selecting `platform` for the handler.
pub fn command_with_platform(
    bot_name: &str,
    cmd: &'static str,
    platform: Option<String>,
) -> Predicate {
    let bot_name = bot_name.to_string();
    Box::new(move |update| {
        let text = message_text(update)?;
        matches_command(text, &bot_name, cmd).then(|| RouteMatch {
            platform: platform.clone(),
        })
    })
}

/// `/<platform>` for every registered platform that is not a built-in command.
pub fn platform_command(bot_name: &str, resolver: Resolver) -> Predicate {
    let bot_name = bot_name.to_string();
    Box::new(move |update| {
        let verb = addressed_command(message_text(update)?, &bot_name)?;
        if is_reserved_command(verb) || !resolver.registry().contains(verb) {
            return None;
        }
        Some(RouteMatch::with_platform(verb))
    })
}

/// Non-command text that a platform recognises: text rule, URL rule, playlist
/// link, or a short link that may expand into one.
pub fn platform_link(resolver: Resolver) -> Predicate {
    Box::new(move |update| {
        let text = message_text(update)?;
        if text.starts_with('/') {
            return None;
        }
        let registry = resolver.registry();
        let recognised = registry.match_text(text).is_some()
            || registry.match_url(text).is_some()
            || registry.match_playlist(text).is_some()
            || resolver.is_short_link(text);
        recognised.then(RouteMatch::default)
    })
}

/// Any other non-command text in a private chat.
pub fn private_text() -> Predicate {
    Box::new(|update| {
        let message = update.message.as_ref()?;
        let text = message.text().trim();
        (message.chat.is_private() && !text.is_empty() && !text.starts_with('/'))
            .then(RouteMatch::default)
    })
}

/// Callback data equal to `prefix` or starting with `prefix `.
pub fn callback_prefix(prefix: &'static str) -> Predicate {
    Box::new(move |update| {
        let data = update.callback_query.as_ref()?.data.as_deref()?;
        let matched = data == prefix
            || data
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with(' '));
        matched.then(RouteMatch::default)
    })
}

pub fn inline_query() -> Predicate {
    Box::new(|update| update.inline_query.as_ref().map(|_| RouteMatch::default()))
}
