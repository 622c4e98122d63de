//! User-facing strings and rendering.

use mb_platform::{Lyrics, PlatformError, PlatformMetadata, Quality, Track, TrackRef};

/// Stays below Telegram's 4096 UTF-16 unit message limit.
const TELEGRAM_MAX_TEXT_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    En,
    Zh,
}

impl Lang {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some(code) if code.to_ascii_lowercase().starts_with("zh") => Lang::Zh,
            _ => Lang::En,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Text {
    NotRecognized,
    NotFound,
    Unavailable,
    Unsupported,
    GenericFailure,
    Resolving,
    LyricsUnsupported,
    LyricsEmpty,
    LyricsButton,
    SearchUsage,
    SearchEmpty,
    SearchUnsupported,
    RecognizeUsage,
    RecognizeUnsupported,
    RmcacheUsage,
    RmcacheDenied,
    RmcacheDone,
    SettingsTitle,
    SettingsSaved,
    SettingsClose,
    InvalidQuality,
}

pub fn text(lang: Lang, key: Text) -> &'static str {
    match (lang, key) {
        (Lang::En, Text::NotRecognized) => "Could not recognise a track in that message.",
        (Lang::Zh, Text::NotRecognized) => "未能从消息中识别出歌曲。",
        (Lang::En, Text::NotFound) => "Track not found.",
        (Lang::Zh, Text::NotFound) => "未找到该歌曲。",
        (Lang::En, Text::Unavailable) => "The platform is temporarily unavailable, try again later.",
        (Lang::Zh, Text::Unavailable) => "平台暂时不可用，请稍后再试。",
        (Lang::En, Text::Unsupported) => "This platform does not support that.",
        (Lang::Zh, Text::Unsupported) => "该平台不支持此操作。",
        (Lang::En, Text::GenericFailure) => "Something went wrong.",
        (Lang::Zh, Text::GenericFailure) => "出错了。",
        (Lang::En, Text::Resolving) => "⏳ Resolving…",
        (Lang::Zh, Text::Resolving) => "⏳ 正在解析…",
        (Lang::En, Text::LyricsUnsupported) => "This platform does not provide lyrics.",
        (Lang::Zh, Text::LyricsUnsupported) => "该平台不提供歌词。",
        (Lang::En, Text::LyricsEmpty) => "No lyrics for this track.",
        (Lang::Zh, Text::LyricsEmpty) => "这首歌没有歌词。",
        (Lang::En, Text::LyricsButton) => "📝 Lyrics",
        (Lang::Zh, Text::LyricsButton) => "📝 歌词",
        (Lang::En, Text::SearchUsage) => "Usage: /search [platform] <keywords>",
        (Lang::Zh, Text::SearchUsage) => "用法：/search [平台] <关键词>",
        (Lang::En, Text::SearchEmpty) => "No results.",
        (Lang::Zh, Text::SearchEmpty) => "没有搜索结果。",
        (Lang::En, Text::SearchUnsupported) => "Search is not available for this platform.",
        (Lang::Zh, Text::SearchUnsupported) => "该平台不支持搜索。",
        (Lang::En, Text::RecognizeUsage) => "Reply to a voice or audio message with /recognize.",
        (Lang::Zh, Text::RecognizeUsage) => "请回复一条语音或音频消息并发送 /recognize。",
        (Lang::En, Text::RecognizeUnsupported) => "Audio recognition is not configured.",
        (Lang::Zh, Text::RecognizeUnsupported) => "未配置听歌识曲服务。",
        (Lang::En, Text::RmcacheUsage) => "Usage: /rmcache <platform> <track id>",
        (Lang::Zh, Text::RmcacheUsage) => "用法：/rmcache <平台> <歌曲ID>",
        (Lang::En, Text::RmcacheDenied) => "Only bot admins can clear the cache.",
        (Lang::Zh, Text::RmcacheDenied) => "只有管理员可以清除缓存。",
        (Lang::En, Text::RmcacheDone) => "Cache cleared for",
        (Lang::Zh, Text::RmcacheDone) => "已清除缓存：",
        (Lang::En, Text::SettingsTitle) => "Default quality",
        (Lang::Zh, Text::SettingsTitle) => "默认音质",
        (Lang::En, Text::SettingsSaved) => "Saved.",
        (Lang::Zh, Text::SettingsSaved) => "已保存。",
        (Lang::En, Text::SettingsClose) => "Close",
        (Lang::Zh, Text::SettingsClose) => "关闭",
        (Lang::En, Text::InvalidQuality) => "Unknown quality.",
        (Lang::Zh, Text::InvalidQuality) => "无效的音质。",
    }
}

pub fn describe_platform_error(lang: Lang, error: &PlatformError) -> &'static str {
    match error {
        PlatformError::NotFound(_) => text(lang, Text::NotFound),
        PlatformError::Unavailable(_) | PlatformError::Http(_) => text(lang, Text::Unavailable),
        PlatformError::Unsupported(_) => text(lang, Text::Unsupported),
        _ => text(lang, Text::GenericFailure),
    }
}

/// Localised text for any handler error; unclassified errors get the generic
/// message.
pub fn describe_error(lang: Lang, error: &anyhow::Error) -> &'static str {
    match error.downcast_ref::<PlatformError>() {
        Some(platform_error) => describe_platform_error(lang, platform_error),
        None => text(lang, Text::GenericFailure),
    }
}

pub fn start_text(platforms: &[&PlatformMetadata]) -> String {
    let mut out = String::from(
        "Send me a track link or platform:id and I'll fetch it.\n\
         /music <platform> <id> <quality> · /search <keywords> · /lyric · /settings\n\nPlatforms:",
    );
    for meta in platforms {
        out.push_str(&format!(
            "\n{} {} — /{}",
            meta.emoji, meta.display_name, meta.name
        ));
    }
    out
}

pub fn about_text() -> String {
    format!(
        "musicbot v{}\nResolves music links and ids across platforms.",
        env!("CARGO_PKG_VERSION")
    )
}

pub fn track_card(
    meta: &PlatformMetadata,
    track_ref: &TrackRef,
    track: Option<&Track>,
    quality: Quality,
) -> String {
    let mut out = format!("{} {}", meta.emoji, meta.display_name);
    match track {
        Some(track) => {
            out.push_str(&format!("\n{}", track.title));
            if !track.artists.is_empty() {
                out.push_str(&format!(" — {}", track.artists.join(" / ")));
            }
            if let Some(album) = &track.album {
                out.push_str(&format!("\n💿 {album}"));
            }
            if let Some(secs) = track.duration_secs {
                out.push_str(&format!("\n⏱ {}:{:02}", secs / 60, secs % 60));
            }
        }
        None => out.push_str(&format!("\n#{}", track_ref.track_id)),
    }
    out.push_str(&format!("\n🎚 {quality}"));
    out
}

pub fn search_results(platform: &PlatformMetadata, tracks: &[Track]) -> String {
    let mut out = format!("{} {}", platform.emoji, platform.display_name);
    for (index, track) in tracks.iter().enumerate() {
        out.push_str(&format!("\n{}. {}", index + 1, track.title));
        if !track.artists.is_empty() {
            out.push_str(&format!(" — {}", track.artists.join(" / ")));
        }
        out.push_str(&format!("  /{} {}", platform.name, track.id));
    }
    out
}

/// Timed lines render as `[mm:ss.xx] text`; plain lyrics pass through.
pub fn render_lyrics(lyrics: &Lyrics) -> String {
    let rendered = match lyrics {
        Lyrics::Plain(text) => text.trim().to_string(),
        Lyrics::Timed(lines) => lines
            .iter()
            .map(|line| {
                let centis = line.timestamp.as_millis() / 10;
                format!(
                    "[{:02}:{:02}.{:02}] {}",
                    centis / 6000,
                    (centis / 100) % 60,
                    centis % 100,
                    line.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };
    truncate_for_telegram(&rendered)
}

pub fn truncate_for_telegram(text: &str) -> String {
    if text.chars().count() <= TELEGRAM_MAX_TEXT_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(TELEGRAM_MAX_TEXT_CHARS - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_platform::LyricLine;
    use std::time::Duration;

    #[test]
    fn language_selection() {
        assert_eq!(Lang::from_code(Some("zh-hans")), Lang::Zh);
        assert_eq!(Lang::from_code(Some("en")), Lang::En);
        assert_eq!(Lang::from_code(None), Lang::En);
    }

    #[test]
    fn errors_map_to_taxonomy_messages() {
        let not_found = anyhow::Error::new(PlatformError::NotFound("x".to_string()));
        assert_eq!(describe_error(Lang::En, &not_found), "Track not found.");
        let unsupported = PlatformError::Unsupported("x".to_string());
        assert_eq!(
            describe_platform_error(Lang::Zh, &unsupported),
            "该平台不支持此操作。"
        );
        let other = anyhow::anyhow!("boom");
        assert_eq!(describe_error(Lang::En, &other), "Something went wrong.");
    }

    #[test]
    fn timed_lyrics_render_with_timestamps() {
        let lyrics = Lyrics::Timed(vec![
            LyricLine {
                timestamp: Duration::from_millis(5_120),
                text: "first".to_string(),
            },
            LyricLine {
                timestamp: Duration::from_millis(65_000),
                text: "second".to_string(),
            },
        ]);
        assert_eq!(
            render_lyrics(&lyrics),
            "[00:05.12] first\n[01:05.00] second"
        );
        assert_eq!(render_lyrics(&Lyrics::Plain("  la la \n".to_string())), "la la");
    }

    #[test]
    fn long_text_is_truncated() {
        let long = "a".repeat(5000);
        let out = truncate_for_telegram(&long);
        assert_eq!(out.chars().count(), 4000);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn track_card_falls_back_to_id() {
        let meta = PlatformMetadata {
            name: "netease".to_string(),
            display_name: "NetEase".to_string(),
            emoji: "🎵".to_string(),
        };
        let card = track_card(&meta, &TrackRef::new("netease", "42"), None, Quality::High);
        assert_eq!(card, "🎵 NetEase\n#42\n🎚 high");
    }
}
