//! Turns message text into a `(platform, track id)` pair.
//!
//! Strategies run in a fixed order and the first hit wins:
//! command arguments, short-link expansion, playlist exclusion, platform text
//! rules, platform URL rules.

use crate::commands::{base_command, command_arguments, is_command_message};
use mb_platform::{Quality, Registry, ShortLinkResolver, TrackRef};
use mb_telegram::Message;
use std::borrow::Cow;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Commands whose arguments read `<platform> <track id> <quality>`.
pub const TRACK_ARGUMENT_COMMANDS: [&str; 3] = ["music", "lyric", "rmcache"];

pub async fn extract_platform_track(
    message: Option<&Message>,
    registry: &Registry,
    links: Option<&dyn ShortLinkResolver>,
    cancel: &CancellationToken,
) -> Option<TrackRef> {
    let message = message?;
    let text = message.text().trim();
    if text.is_empty() {
        return None;
    }

    if let Some(track) = from_command_arguments(message, registry) {
        return Some(track);
    }

    let candidate = free_text_candidate(message, text);
    let resolved = expand_short_link(candidate, links, cancel).await;
    if let Some(platform) = registry.match_playlist(&resolved) {
        tracing::debug!(%platform, "playlist link is not a single track");
        return None;
    }

    registry
        .match_text(&resolved)
        .or_else(|| registry.match_url(&resolved))
}

/// Text the free-text rules see: a command's arguments, or the whole text
/// for non-commands and bare commands.
fn free_text_candidate<'a>(message: &Message, text: &'a str) -> &'a str {
    if !is_command_message(message) {
        return text;
    }
    match command_arguments(text) {
        "" => text,
        args => args,
    }
}

/// `/music <platform> <id> <quality>` with all three parts valid. Anything
/// shorter or with an unknown quality is left to the text/URL rules.
fn from_command_arguments(message: &Message, registry: &Registry) -> Option<TrackRef> {
    if !is_command_message(message) {
        return None;
    }
    let text = message.text();
    let verb = base_command(text)?;
    if !TRACK_ARGUMENT_COMMANDS.contains(&verb) {
        return None;
    }
    let args: Vec<&str> = command_arguments(text).split_whitespace().collect();
    let [platform, track_id, quality] = args.as_slice() else {
        return None;
    };
    Quality::from_canonical(quality)?;
    registry.get(platform)?;
    Some(TrackRef::new(*platform, *track_id))
}

async fn expand_short_link<'a>(
    text: &'a str,
    links: Option<&dyn ShortLinkResolver>,
    cancel: &CancellationToken,
) -> Cow<'a, str> {
    let Some(links) = links else {
        return Cow::Borrowed(text);
    };
    let Some(short) = links.find(text) else {
        return Cow::Borrowed(text);
    };
    let expanded = tokio::select! {
        _ = cancel.cancelled() => return Cow::Borrowed(text),
        expanded = links.expand(short) => expanded,
    };
    match expanded {
        Ok(target) => {
            tracing::debug!(%short, %target, "short link expanded");
            Cow::Owned(text.replacen(short, &target, 1))
        }
        Err(error) => {
            tracing::debug!(%short, %error, "short link expansion failed; using original text");
            Cow::Borrowed(text)
        }
    }
}

/// Platform-scoped match for a bare token: the platform's own text rule, else
/// the token itself when it looks like an id.
pub fn match_platform_track(
    registry: &Registry,
    platform: &str,
    token: &str,
    min_len: usize,
) -> Option<TrackRef> {
    let adapter = registry.get(platform)?;
    let token = token.trim();
    if let Some(track_id) = adapter.match_text(token) {
        return Some(TrackRef::new(platform, track_id));
    }
    is_likely_id(token, min_len).then(|| TrackRef::new(platform, token))
}

/// ASCII alphanumerics only, and either mixed letters and digits or at least
/// `min_len` characters long. Rejects short words like `jj`.
pub fn is_likely_id(token: &str, min_len: usize) -> bool {
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    let has_letter = token.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    (has_letter && has_digit) || token.len() >= min_len
}

/// Resolution entry point shared by handlers, the inline handler and the CLI.
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<Registry>,
    links: Option<Arc<dyn ShortLinkResolver>>,
    likely_id_min_len: usize,
}

impl Resolver {
    pub fn new(
        registry: Arc<Registry>,
        links: Option<Arc<dyn ShortLinkResolver>>,
        likely_id_min_len: usize,
    ) -> Self {
        Self {
            registry,
            links,
            likely_id_min_len,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn is_short_link(&self, text: &str) -> bool {
        self.links
            .as_ref()
            .is_some_and(|links| links.find(text).is_some())
    }

    pub async fn resolve(
        &self,
        message: Option<&Message>,
        cancel: &CancellationToken,
    ) -> Option<TrackRef> {
        extract_platform_track(message, &self.registry, self.links.as_deref(), cancel).await
    }

    /// The message first, then the message it replies to.
    pub async fn resolve_with_reply(
        &self,
        message: &Message,
        cancel: &CancellationToken,
    ) -> Option<TrackRef> {
        if let Some(track) = self.resolve(Some(message), cancel).await {
            return Some(track);
        }
        self.resolve(message.reply_to_message.as_deref(), cancel)
            .await
    }

    pub fn match_platform_track(&self, platform: &str, token: &str) -> Option<TrackRef> {
        match_platform_track(&self.registry, platform, token, self.likely_id_min_len)
    }
}
