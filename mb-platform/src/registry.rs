//! Name-keyed set of platforms.
//!
//! Populated once at startup through `&mut self`; afterwards it is shared as
//! `Arc<Registry>` and only read. Every lookup walks platforms in registration
//! order so overlapping matchers resolve the same way on every run.

use crate::error::{PlatformError, Result};
use crate::traits::Platform;
use crate::types::TrackRef;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct Registry {
    platforms: Vec<Arc<dyn Platform>>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, platform: Arc<dyn Platform>) -> Result<()> {
        let name = platform.name().to_string();
        if !is_valid_platform_name(&name) {
            return Err(PlatformError::InvalidConfig(format!(
                "platform name {name:?} must be non-empty lowercase [a-z0-9_]"
            )));
        }
        if self.by_name.contains_key(&name) {
            return Err(PlatformError::Duplicate(name));
        }
        tracing::debug!(platform = %name, "platform registered");
        self.by_name.insert(name, self.platforms.len());
        self.platforms.push(platform);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Platform>> {
        self.by_name
            .get(name)
            .map(|&index| self.platforms[index].clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Platform names in registration order.
    pub fn list(&self) -> Vec<&str> {
        self.platforms.iter().map(|p| p.name()).collect()
    }

    pub fn platforms(&self) -> impl Iterator<Item = &Arc<dyn Platform>> {
        self.platforms.iter()
    }

    pub fn match_text(&self, text: &str) -> Option<TrackRef> {
        self.platforms.iter().find_map(|platform| {
            platform
                .match_text(text)
                .filter(|id| !id.is_empty())
                .map(|id| TrackRef::new(platform.name(), id))
        })
    }

    pub fn match_url(&self, text: &str) -> Option<TrackRef> {
        self.platforms.iter().find_map(|platform| {
            platform
                .match_url(text)
                .filter(|id| !id.is_empty())
                .map(|id| TrackRef::new(platform.name(), id))
        })
    }

    /// Name of the first platform that recognises a playlist URL in `text`.
    pub fn match_playlist(&self, text: &str) -> Option<&str> {
        self.platforms
            .iter()
            .find(|platform| platform.match_playlist(text))
            .map(|platform| platform.name())
    }
}

fn is_valid_platform_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::pattern::{PatternPlatform, PatternSpec};
    use crate::{PlatformError, TrackRef};
    use std::sync::Arc;

    fn spec(name: &str, text: &[&str], url: &[&str]) -> PatternSpec {
        PatternSpec {
            name: name.to_string(),
            display_name: name.to_uppercase(),
            emoji: String::new(),
            text_patterns: text.iter().map(|s| s.to_string()).collect(),
            url_patterns: url.iter().map(|s| s.to_string()).collect(),
            playlist_patterns: vec![],
        }
    }

    fn registry(specs: Vec<PatternSpec>) -> Registry {
        let mut registry = Registry::new();
        for spec in specs {
            let platform = PatternPlatform::from_spec(spec).expect("valid spec");
            registry.register(Arc::new(platform)).expect("register");
        }
        registry
    }

    #[test]
    fn list_preserves_registration_order() {
        let registry = registry(vec![
            spec("tidal", &[], &[]),
            spec("netease", &[], &[]),
            spec("qqmusic", &[], &[]),
        ]);
        assert_eq!(registry.list(), vec!["tidal", "netease", "qqmusic"]);
        assert!(registry.get("netease").is_some());
        assert!(registry.get("spotify").is_none());
    }

    #[test]
    fn get_returns_the_same_instance() {
        let registry = registry(vec![spec("netease", &[], &[])]);
        let first = registry.get("netease").expect("registered");
        let second = registry.get("netease").expect("registered");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn duplicate_and_malformed_names_are_rejected() {
        let mut registry = registry(vec![spec("netease", &[], &[])]);
        let dup = PatternPlatform::from_spec(spec("netease", &[], &[])).expect("valid");
        assert!(matches!(
            registry.register(Arc::new(dup)),
            Err(PlatformError::Duplicate(name)) if name == "netease"
        ));
        let upper = PatternPlatform::from_spec(spec("NetEase", &[], &[])).expect("valid");
        assert!(matches!(
            registry.register(Arc::new(upper)),
            Err(PlatformError::InvalidConfig(_))
        ));
    }

    #[test]
    fn first_registered_platform_wins_overlapping_text_rules() {
        let registry = registry(vec![
            spec("alpha", &[r"^id:(?P<id>\d+)$"], &[]),
            spec("beta", &[r"^id:(?P<id>\d+)$"], &[]),
        ]);
        assert_eq!(
            registry.match_text("id:42"),
            Some(TrackRef::new("alpha", "42"))
        );
    }

    #[test]
    fn url_matching_is_separate_from_text_matching() {
        let registry = registry(vec![spec(
            "netease",
            &[r"^netease:(?P<id>\d+)$"],
            &[r"music\.163\.com/.*song\?id=(?P<id>\d+)"],
        )]);
        let url = "https://music.163.com/#/song?id=1901371647";
        assert_eq!(registry.match_text(url), None);
        assert_eq!(
            registry.match_url(url),
            Some(TrackRef::new("netease", "1901371647"))
        );
    }
}
