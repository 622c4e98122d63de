//! musicbot configuration loader.

use mb_platform::{PatternPlatform, PatternSpec, Quality};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct MusicBotConfig {
    pub bot: BotConfig,
    #[serde(default)]
    pub music: MusicConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
    #[serde(default)]
    pub shortlink: ShortLinkConfig,
    #[serde(default)]
    pub platforms: Vec<PatternSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub token: String,
    /// Bot username used for `/cmd@name`. Looked up with `getMe` when empty.
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
    /// Telegram user ids allowed to run `/rmcache`.
    #[serde(default)]
    pub admins: Vec<i64>,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_handler_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct MusicConfig {
    #[serde(default)]
    pub default_platform: Option<String>,
    #[serde(default = "default_quality")]
    pub default_quality: Quality,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Bare tokens of at least this length count as likely track ids.
    #[serde(default = "default_likely_id_min_len")]
    pub likely_id_min_len: usize,
    #[serde(default = "default_platform_timeout_secs")]
    pub platform_timeout_secs: u64,
}

fn default_quality() -> Quality {
    Quality::Hires
}

fn default_search_limit() -> usize {
    10
}

fn default_likely_id_min_len() -> usize {
    4
}

fn default_platform_timeout_secs() -> u64 {
    20
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            default_platform: None,
            default_quality: default_quality(),
            search_limit: default_search_limit(),
            likely_id_min_len: default_likely_id_min_len(),
            platform_timeout_secs: default_platform_timeout_secs(),
        }
    }
}

impl MusicConfig {
    pub fn platform_timeout(&self) -> Duration {
        Duration::from_secs(self.platform_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimiterConfig {
    #[serde(default = "default_limiter_enabled")]
    pub enabled: bool,
    #[serde(default = "default_limiter_capacity")]
    pub capacity: usize,
    #[serde(default = "default_spacing_ms")]
    pub spacing_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
}

fn default_limiter_enabled() -> bool {
    true
}

fn default_limiter_capacity() -> usize {
    1
}

fn default_spacing_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    250
}

fn default_retry_max_ms() -> u64 {
    30_000
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: default_limiter_enabled(),
            capacity: default_limiter_capacity(),
            spacing_ms: default_spacing_ms(),
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortLinkConfig {
    #[serde(default = "default_shortlink_domains")]
    pub domains: Vec<String>,
    #[serde(default = "default_shortlink_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_shortlink_domains() -> Vec<String> {
    vec!["163cn.tv".to_string(), "url.cn".to_string()]
}

fn default_shortlink_timeout_secs() -> u64 {
    5
}

impl Default for ShortLinkConfig {
    fn default() -> Self {
        Self {
            domains: default_shortlink_domains(),
            timeout_secs: default_shortlink_timeout_secs(),
        }
    }
}

impl MusicBotConfig {
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(default_config_path);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;

        let mut cfg = Self::parse(&contents)
            .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?;

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self) {
        for key in ["MUSICBOT_BOT_TOKEN", "TELEGRAM_BOT_TOKEN"] {
            if let Ok(v) = std::env::var(key) {
                if !v.trim().is_empty() {
                    self.bot.token = v;
                    break;
                }
            }
        }
        if let Ok(v) = std::env::var("MUSICBOT_BOT_NAME") {
            if !v.trim().is_empty() {
                self.bot.name = v;
            }
        }
        if let Ok(v) = std::env::var("MUSICBOT_API_BASE") {
            if !v.trim().is_empty() {
                self.bot.api_base = v;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bot.token.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "bot.token is required (or set MUSICBOT_BOT_TOKEN)"
            ));
        }
        if self.bot.poll_timeout_secs == 0 || self.bot.poll_timeout_secs >= 60 {
            return Err(anyhow::anyhow!("bot.poll_timeout_secs must be in 1..60"));
        }
        if self.bot.handler_timeout_secs == 0 {
            return Err(anyhow::anyhow!("bot.handler_timeout_secs must be > 0"));
        }
        if self.limiter.capacity == 0 {
            return Err(anyhow::anyhow!("limiter.capacity must be > 0"));
        }
        if self.limiter.max_attempts == 0 {
            return Err(anyhow::anyhow!("limiter.max_attempts must be > 0"));
        }
        if self.music.search_limit == 0 {
            return Err(anyhow::anyhow!("music.search_limit must be > 0"));
        }
        if self.platforms.is_empty() {
            return Err(anyhow::anyhow!("at least one [[platforms]] entry is required"));
        }
        for spec in &self.platforms {
            PatternPlatform::from_spec(spec.clone())
                .map_err(|e| anyhow::anyhow!("platforms.{}: {e}", spec.name))?;
        }
        if let Some(default) = &self.music.default_platform {
            if !self.platforms.iter().any(|p| &p.name == default) {
                return Err(anyhow::anyhow!(
                    "music.default_platform {default:?} is not a configured platform"
                ));
            }
        }
        Ok(())
    }

    /// Platform used by search when the user names none.
    pub fn default_platform(&self) -> Option<&str> {
        self.music
            .default_platform
            .as_deref()
            .or_else(|| self.platforms.first().map(|p| p.name.as_str()))
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.bot.admins.contains(&user_id)
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".musicbot").join("config.toml")
}
