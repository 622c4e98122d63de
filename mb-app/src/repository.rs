//! Track cache bookkeeping.
//!
//! Handlers depend only on [`TrackRepository`]. The bundled implementation is
//! in-memory; durable storage is a drop-in replacement behind the trait.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mb_platform::Quality;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRecord {
    pub platform: String,
    pub track_id: String,
    pub quality: Quality,
    pub chat_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct CachedTrack {
    pub platform: String,
    pub track_id: String,
    pub quality: Quality,
    /// Chat and user that first requested this entry.
    pub chat_id: i64,
    pub user_id: i64,
    pub send_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_sent_at: DateTime<Utc>,
}

#[async_trait]
pub trait TrackRepository: Send + Sync {
    async fn count(&self) -> Result<u64>;
    async fn count_by_chat_id(&self, chat_id: i64) -> Result<u64>;
    async fn count_by_user_id(&self, user_id: i64) -> Result<u64>;
    async fn count_by_platform(&self, platform: &str) -> Result<u64>;
    /// Total sends across all cached tracks.
    async fn get_send_count(&self) -> Result<u64>;
    async fn delete_all_qualities_by_platform_track_id(
        &self,
        platform: &str,
        track_id: &str,
    ) -> Result<()>;
    async fn record_send(&self, record: SendRecord) -> Result<()>;
}

type CacheKey = (String, String, Quality);

#[derive(Default)]
pub struct MemoryRepository {
    tracks: DashMap<CacheKey, CachedTrack>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn count_where(&self, pred: impl Fn(&CachedTrack) -> bool) -> u64 {
        self.tracks.iter().filter(|entry| pred(entry.value())).count() as u64
    }
}

#[async_trait]
impl TrackRepository for MemoryRepository {
    async fn count(&self) -> Result<u64> {
        Ok(self.tracks.len() as u64)
    }

    async fn count_by_chat_id(&self, chat_id: i64) -> Result<u64> {
        Ok(self.count_where(|t| t.chat_id == chat_id))
    }

    async fn count_by_user_id(&self, user_id: i64) -> Result<u64> {
        Ok(self.count_where(|t| t.user_id == user_id))
    }

    async fn count_by_platform(&self, platform: &str) -> Result<u64> {
        Ok(self.count_where(|t| t.platform == platform))
    }

    async fn get_send_count(&self) -> Result<u64> {
        Ok(self.tracks.iter().map(|entry| entry.send_count).sum())
    }

    async fn delete_all_qualities_by_platform_track_id(
        &self,
        platform: &str,
        track_id: &str,
    ) -> Result<()> {
        self.tracks
            .retain(|(p, id, _), _| !(p == platform && id == track_id));
        Ok(())
    }

    async fn record_send(&self, record: SendRecord) -> Result<()> {
        let now = Utc::now();
        let key = (
            record.platform.clone(),
            record.track_id.clone(),
            record.quality,
        );
        self.tracks
            .entry(key)
            .and_modify(|track| {
                track.send_count += 1;
                track.last_sent_at = now;
            })
            .or_insert_with(|| CachedTrack {
                platform: record.platform,
                track_id: record.track_id,
                quality: record.quality,
                chat_id: record.chat_id,
                user_id: record.user_id,
                send_count: 1,
                created_at: now,
                last_sent_at: now,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryRepository, SendRecord, TrackRepository};
    use mb_platform::Quality;

    fn record(platform: &str, id: &str, quality: Quality, chat: i64, user: i64) -> SendRecord {
        SendRecord {
            platform: platform.to_string(),
            track_id: id.to_string(),
            quality,
            chat_id: chat,
            user_id: user,
        }
    }

    #[tokio::test]
    async fn counts_follow_recorded_sends() {
        let repo = MemoryRepository::new();
        repo.record_send(record("netease", "1", Quality::Hires, 10, 100))
            .await
            .expect("record");
        repo.record_send(record("netease", "1", Quality::Hires, 11, 101))
            .await
            .expect("record");
        repo.record_send(record("netease", "1", Quality::High, 10, 100))
            .await
            .expect("record");
        repo.record_send(record("tidal", "x9", Quality::Lossless, 12, 100))
            .await
            .expect("record");

        assert_eq!(repo.count().await.expect("count"), 3);
        assert_eq!(repo.count_by_chat_id(10).await.expect("count"), 2);
        assert_eq!(repo.count_by_user_id(100).await.expect("count"), 3);
        assert_eq!(repo.count_by_platform("netease").await.expect("count"), 2);
        assert_eq!(repo.get_send_count().await.expect("sends"), 4);
    }

    #[tokio::test]
    async fn delete_removes_every_quality_of_one_track() {
        let repo = MemoryRepository::new();
        for quality in Quality::ALL {
            repo.record_send(record("netease", "1", quality, 1, 1))
                .await
                .expect("record");
        }
        repo.record_send(record("netease", "2", Quality::Hires, 1, 1))
            .await
            .expect("record");

        repo.delete_all_qualities_by_platform_track_id("netease", "1")
            .await
            .expect("delete");

        assert_eq!(repo.count().await.expect("count"), 1);
        assert_eq!(repo.count_by_platform("netease").await.expect("count"), 1);
    }
}
