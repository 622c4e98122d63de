use crate::error::{PlatformError, Result};
use crate::types::{Lyrics, PlatformMetadata, Track};
use async_trait::async_trait;

#[async_trait]
pub trait Platform: Send + Sync {
    fn metadata(&self) -> &PlatformMetadata;

    /// Stable lowercase identifier, also used as the dynamic command name.
    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Track id referenced by free text such as `netease:12345`.
    fn match_text(&self, text: &str) -> Option<String>;

    /// Track id referenced by a single-track URL anywhere in `text`.
    fn match_url(&self, text: &str) -> Option<String>;

    /// True if `text` contains a playlist URL for this platform.
    fn match_playlist(&self, _text: &str) -> bool {
        false
    }

    fn supports_lyrics(&self) -> bool {
        false
    }

    async fn get_lyrics(&self, _track_id: &str) -> Result<Lyrics> {
        Err(PlatformError::Unsupported(format!(
            "{} does not provide lyrics",
            self.name()
        )))
    }

    fn supports_search(&self) -> bool {
        false
    }

    async fn search(&self, _keyword: &str, _limit: usize) -> Result<Vec<Track>> {
        Err(PlatformError::Unsupported(format!(
            "{} does not support search",
            self.name()
        )))
    }

    async fn get_track(&self, _track_id: &str) -> Result<Track> {
        Err(PlatformError::Unsupported(format!(
            "{} does not provide track metadata",
            self.name()
        )))
    }
}
