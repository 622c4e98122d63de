use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformMetadata {
    pub name: String,
    pub display_name: String,
    pub emoji: String,
}

/// A resolved reference to one track on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackRef {
    pub platform: String,
    pub track_id: String,
}

impl TrackRef {
    pub fn new(platform: impl Into<String>, track_id: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            track_id: track_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricLine {
    pub timestamp: Duration,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lyrics {
    Timed(Vec<LyricLine>),
    Plain(String),
}

impl Lyrics {
    pub fn is_empty(&self) -> bool {
        match self {
            Lyrics::Timed(lines) => lines.iter().all(|line| line.text.trim().is_empty()),
            Lyrics::Plain(text) => text.trim().is_empty(),
        }
    }
}
