//! Per-user preferences kept for the lifetime of the process.

use dashmap::DashMap;
use mb_platform::Quality;

#[derive(Debug, Default)]
pub struct SettingsStore {
    quality: DashMap<i64, Quality>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quality(&self, user_id: i64) -> Option<Quality> {
        self.quality.get(&user_id).map(|q| *q)
    }

    pub fn set_quality(&self, user_id: i64, quality: Quality) {
        self.quality.insert(user_id, quality);
    }

    /// Override first, then the user's setting, then `default`.
    pub fn effective_quality(
        &self,
        user_id: Option<i64>,
        requested: Option<Quality>,
        default: Quality,
    ) -> Quality {
        requested
            .or_else(|| user_id.and_then(|id| self.quality(id)))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::SettingsStore;
    use mb_platform::Quality;

    #[test]
    fn override_beats_user_setting_beats_default() {
        let store = SettingsStore::new();
        assert_eq!(
            store.effective_quality(Some(1), None, Quality::Hires),
            Quality::Hires
        );
        store.set_quality(1, Quality::Standard);
        assert_eq!(
            store.effective_quality(Some(1), None, Quality::Hires),
            Quality::Standard
        );
        assert_eq!(
            store.effective_quality(Some(1), Some(Quality::Lossless), Quality::Hires),
            Quality::Lossless
        );
        assert_eq!(
            store.effective_quality(None, None, Quality::High),
            Quality::High
        );
    }
}
