//! Process wiring: config → platforms → Telegram → router, plus the one-shot
//! `check` and `resolve` commands.

use crate::commands::command_arguments;
use crate::config::MusicBotConfig;
use crate::handlers::{AppContext, build_router};
use crate::quality::extract_quality;
use crate::repository::MemoryRepository;
use crate::resolve::Resolver;
use crate::router::Router;
use anyhow::Result;
use mb_platform::{HttpShortLinkResolver, PatternPlatform, Quality, Registry, ShortLinkResolver};
use mb_telegram::{
    Chat, Dispatcher, Message, MessageEntity, RateLimiter, RetryPolicy, TelegramApi, Update,
    run_poll_loop,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

const UPDATE_QUEUE_CAPACITY: usize = 256;

pub fn build_registry(cfg: &MusicBotConfig) -> Result<Registry> {
    let mut registry = Registry::new();
    for spec in &cfg.platforms {
        let name = spec.name.clone();
        let platform = PatternPlatform::from_spec(spec.clone())
            .map_err(|e| anyhow::anyhow!("platform {name}: {e}"))?;
        registry.register(Arc::new(platform))?;
        tracing::debug!(platform = %name, "platform registered");
    }
    Ok(registry)
}

pub fn build_resolver(cfg: &MusicBotConfig) -> Result<Resolver> {
    let registry = build_registry(cfg)?;
    let links: Option<Arc<dyn ShortLinkResolver>> = if cfg.shortlink.domains.is_empty() {
        None
    } else {
        Some(Arc::new(HttpShortLinkResolver::new(
            cfg.shortlink.domains.clone(),
            Duration::from_secs(cfg.shortlink.timeout_secs),
        )?))
    };
    Ok(Resolver::new(
        Arc::new(registry),
        links,
        cfg.music.likely_id_min_len,
    ))
}

fn build_limiter(cfg: &MusicBotConfig) -> Option<RateLimiter> {
    cfg.limiter.enabled.then(|| {
        RateLimiter::new(
            cfg.limiter.capacity,
            Duration::from_millis(cfg.limiter.spacing_ms),
        )
    })
}

fn retry_policy(cfg: &MusicBotConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: cfg.limiter.max_attempts,
        base_delay: Duration::from_millis(cfg.limiter.retry_base_ms),
        max_delay: Duration::from_millis(cfg.limiter.retry_max_ms),
    }
}

async fn resolve_bot_name(cfg: &MusicBotConfig, api: &TelegramApi) -> Result<String> {
    if !cfg.bot.name.trim().is_empty() {
        return Ok(cfg.bot.name.trim().trim_start_matches('@').to_string());
    }
    let me = api
        .get_me()
        .await
        .map_err(|e| anyhow::anyhow!("telegram getMe failed: {e}"))?;
    me.username
        .ok_or_else(|| anyhow::anyhow!("bot account has no username; set bot.name"))
}

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = MusicBotConfig::load(config_path).await?;
    let resolver = build_resolver(&cfg)?;
    let api = TelegramApi::with_base_url(&cfg.bot.token, &cfg.bot.api_base)?;
    let bot_name = resolve_bot_name(&cfg, &api).await?;
    tracing::info!(
        bot = %bot_name,
        platforms = ?resolver.registry().list(),
        limiter = cfg.limiter.enabled,
        "musicbot starting"
    );

    let dispatcher = Dispatcher::new(Arc::new(api.clone()), retry_policy(&cfg));
    let limiter = build_limiter(&cfg);
    let handler_timeout = Duration::from_secs(cfg.bot.handler_timeout_secs);
    let poll_timeout_secs = cfg.bot.poll_timeout_secs;
    let ctx = Arc::new(AppContext::new(
        cfg,
        bot_name,
        resolver,
        Arc::new(MemoryRepository::new()),
        dispatcher,
        limiter,
    ));
    let router = Arc::new(build_router(&ctx));
    tracing::debug!(routes = ?router.route_names(), "router built");

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let (tx, mut rx) = mpsc::channel::<Update>(UPDATE_QUEUE_CAPACITY);
    let poller = tokio::spawn(run_poll_loop(
        api,
        poll_timeout_secs,
        tx,
        shutdown.clone(),
    ));

    let mut in_flight = JoinSet::new();
    loop {
        let update = tokio::select! {
            _ = shutdown.cancelled() => break,
            update = rx.recv() => match update {
                Some(update) => update,
                None => break,
            },
        };
        while in_flight.try_join_next().is_some() {}
        in_flight.spawn(handle_update(
            ctx.clone(),
            router.clone(),
            update,
            shutdown.child_token(),
            handler_timeout,
        ));
    }

    shutdown.cancel();
    tracing::info!(in_flight = in_flight.len(), "draining handlers");
    while let Some(joined) = in_flight.join_next().await {
        if let Err(error) = joined {
            tracing::error!(%error, "handler task join failed");
        }
    }
    match poller.await {
        Ok(Ok(())) => tracing::info!("poll loop stopped"),
        Ok(Err(error)) => tracing::error!(%error, "poll loop failed"),
        Err(error) => tracing::error!(%error, "poll loop task join failed"),
    }
    Ok(())
}

async fn handle_update(
    ctx: Arc<AppContext>,
    router: Arc<Router>,
    update: Update,
    cancel: CancellationToken,
    timeout: Duration,
) {
    let update_id = update.update_id;
    let dispatch = router.dispatch(&ctx, &update, cancel.clone());
    if tokio::time::timeout(timeout, dispatch).await.is_err() {
        cancel.cancel();
        tracing::warn!(update_id, ?timeout, "handler timed out");
    }
}

pub async fn check(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = MusicBotConfig::load(config_path).await?;
    let registry = build_registry(&cfg)?;
    println!("config ok");
    println!(
        "default platform: {}",
        cfg.default_platform().unwrap_or("(none)")
    );
    println!("default quality: {}", cfg.music.default_quality);
    for platform in registry.platforms() {
        let meta = platform.metadata();
        println!("platform {} ({} {})", meta.name, meta.emoji, meta.display_name);
    }
    if cfg.limiter.enabled {
        println!(
            "limiter: capacity={} spacing={}ms attempts={}",
            cfg.limiter.capacity, cfg.limiter.spacing_ms, cfg.limiter.max_attempts
        );
    } else {
        println!("limiter: disabled");
    }
    Ok(())
}

pub async fn resolve_one_shot(config_path: Option<PathBuf>, text: &str) -> Result<()> {
    let cfg = MusicBotConfig::load(config_path).await?;
    let resolver = build_resolver(&cfg)?;
    match describe_resolution(&resolver, text, cfg.music.default_quality).await {
        Some(line) => println!("{line}"),
        None => println!("no track recognised"),
    }
    Ok(())
}

/// Offline equivalent of what a chat message resolves to.
async fn describe_resolution(resolver: &Resolver, text: &str, default: Quality) -> Option<String> {
    let message = cli_message(text);
    let cancel = CancellationToken::new();
    let track = match resolver.resolve(Some(&message), &cancel).await {
        Some(track) => track,
        None => {
            let args: Vec<&str> = command_arguments(text).split_whitespace().collect();
            let [platform, token, ..] = args.as_slice() else {
                return None;
            };
            resolver.match_platform_track(platform, token)?
        }
    };
    let quality = extract_quality(Some(&message)).unwrap_or(default);
    Some(format!(
        "platform={} track_id={} quality={quality}",
        track.platform, track.track_id
    ))
}

fn cli_message(text: &str) -> Message {
    let text = text.trim();
    let mut message = Message::with_text(
        Chat {
            id: 0,
            kind: "private".to_string(),
            title: None,
        },
        text,
    );
    if text.starts_with('/') {
        let length = text.split_whitespace().next().map_or(0, str::len);
        message.entities.push(MessageEntity {
            kind: "bot_command".to_string(),
            offset: 0,
            length,
        });
    }
    message
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
            _ = shutdown.cancelled() => return,
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => tracing::warn!("received ctrl-c; beginning graceful shutdown"),
                Err(e) => tracing::error!(error = %e, "failed to await ctrl-c signal"),
            },
            _ = shutdown.cancelled() => return,
        }
    }
    shutdown.cancel();
}
