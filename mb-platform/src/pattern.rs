//! Regex-driven platform used for platforms configured in `[[platforms]]`.
//!
//! Each pattern must expose the track id either as a named `id` group or as
//! its first capture group.

use crate::error::{PlatformError, Result};
use crate::traits::Platform;
use crate::types::PlatformMetadata;
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PatternSpec {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub text_patterns: Vec<String>,
    #[serde(default)]
    pub url_patterns: Vec<String>,
    #[serde(default)]
    pub playlist_patterns: Vec<String>,
}

pub struct PatternPlatform {
    metadata: PlatformMetadata,
    text: Vec<Regex>,
    url: Vec<Regex>,
    playlist: Vec<Regex>,
}

impl PatternPlatform {
    pub fn from_spec(spec: PatternSpec) -> Result<Self> {
        let display_name = if spec.display_name.trim().is_empty() {
            spec.name.clone()
        } else {
            spec.display_name
        };
        Ok(Self {
            text: compile_id_patterns(&spec.name, &spec.text_patterns)?,
            url: compile_id_patterns(&spec.name, &spec.url_patterns)?,
            playlist: spec
                .playlist_patterns
                .iter()
                .map(|p| Regex::new(p))
                .collect::<std::result::Result<_, _>>()?,
            metadata: PlatformMetadata {
                name: spec.name,
                display_name,
                emoji: spec.emoji,
            },
        })
    }
}

fn compile_id_patterns(platform: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            let regex = Regex::new(pattern)?;
            if regex.captures_len() < 2 {
                return Err(PlatformError::InvalidConfig(format!(
                    "{platform}: pattern {pattern:?} has no capture group for the track id"
                )));
            }
            Ok(regex)
        })
        .collect()
}

fn capture_id(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|regex| {
        let caps = regex.captures(text)?;
        caps.name("id")
            .or_else(|| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|id| !id.is_empty())
    })
}

#[async_trait::async_trait]
impl Platform for PatternPlatform {
    fn metadata(&self) -> &PlatformMetadata {
        &self.metadata
    }

    fn match_text(&self, text: &str) -> Option<String> {
        capture_id(&self.text, text.trim())
    }

    fn match_url(&self, text: &str) -> Option<String> {
        capture_id(&self.url, text)
    }

    fn match_playlist(&self, text: &str) -> bool {
        self.playlist.iter().any(|regex| regex.is_match(text))
    }
}

#[cfg(test)]
mod tests {
    use super::{PatternPlatform, PatternSpec};
    use crate::{Platform, PlatformError};

    fn netease() -> PatternPlatform {
        PatternPlatform::from_spec(PatternSpec {
            name: "netease".to_string(),
            display_name: String::new(),
            emoji: "🎵".to_string(),
            text_patterns: vec![r"^netease:(?P<id>\d+)$".to_string()],
            url_patterns: vec![r"music\.163\.com/(?:#/)?(?:m/)?song\?(?:.*&)?id=(\d+)".to_string()],
            playlist_patterns: vec![r"music\.163\.com/(?:#/)?(?:m/)?playlist".to_string()],
        })
        .expect("valid spec")
    }

    #[test]
    fn display_name_defaults_to_name() {
        assert_eq!(netease().metadata().display_name, "netease");
    }

    #[test]
    fn text_rule_uses_named_group_and_trims() {
        let platform = netease();
        assert_eq!(platform.match_text("  netease:12345 ").as_deref(), Some("12345"));
        assert_eq!(platform.match_text("netease 12345"), None);
    }

    #[test]
    fn url_rule_falls_back_to_first_group() {
        let platform = netease();
        assert_eq!(
            platform
                .match_url("listen: https://music.163.com/song?id=77&userid=5")
                .as_deref(),
            Some("77")
        );
        assert!(platform.match_playlist("https://music.163.com/#/playlist?id=1"));
        assert!(!platform.match_playlist("https://music.163.com/song?id=1"));
    }

    #[test]
    fn patterns_without_capture_groups_are_rejected() {
        let err = PatternPlatform::from_spec(PatternSpec {
            name: "broken".to_string(),
            display_name: String::new(),
            emoji: String::new(),
            text_patterns: vec![r"^\d+$".to_string()],
            url_patterns: vec![],
            playlist_patterns: vec![],
        });
        assert!(matches!(err, Err(PlatformError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn optional_capabilities_default_to_unsupported() {
        let platform = netease();
        assert!(!platform.supports_lyrics());
        assert!(matches!(
            platform.get_lyrics("1").await,
            Err(PlatformError::Unsupported(_))
        ));
        assert!(matches!(
            platform.search("song", 5).await,
            Err(PlatformError::Unsupported(_))
        ));
    }
}
